use std::fmt;
use std::io;
use std::num::TryFromIntError;

use quick_error::quick_error;

use crate::tags::{CompressionMethod, SampleFormat, Tag, Type};

quick_error! {
    /// Codec error kinds.
    #[derive(Debug)]
    pub enum CodecError {
        /// The file is not formatted properly
        Format(err: FormatError) {
            from()
            display("malformed container: {}", err)
        }

        /// A tag needed to locate or interpret pixel data is absent
        MissingTag(tag: Tag) {
            display("required tag {:?} is missing", tag)
        }

        /// The file is valid but uses a layout this crate does not handle
        Unsupported(err: UnsupportedError) {
            from()
            display("unsupported: {}", err)
        }

        /// A compressed chunk could not be expanded
        Decompression(msg: String) {
            display("decompression failed: {}", msg)
        }

        /// An I/O Error occurred while reading or writing
        Io(err: io::Error) {
            from()
            display("{}", err)
            source(err)
        }

        /// The API was used in a way that cannot produce a valid file
        Usage(err: UsageError) {
            from()
            display("usage error: {}", err)
        }

        /// The limits of the decoder were exceeded
        LimitsExceeded {
            display("decoder limits exceeded")
        }

        /// An integer conversion to or from a platform size failed
        IntSizeError {
            display("platform or format size limits exceeded")
        }
    }
}

impl From<TryFromIntError> for CodecError {
    fn from(_err: TryFromIntError) -> CodecError {
        CodecError::IntSizeError
    }
}

/// The image or grid file is not formatted properly.
///
/// Every variant aborts the read that produced it: a container is read in
/// full or not at all.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FormatError {
    ImageFileDirectoryNotFound,
    /// An IFD chain points back into itself.
    CycleInOffsets(u64),
    InconsistentSizesEncountered,
    /// A tag is present but its payload has the wrong shape.
    InvalidTagValue(Tag),
    /// The GeoKey directory is shorter than its header claims.
    GeoKeyDirectoryTruncated { expected: usize, found: usize },
    /// A fixed-width textual field could not be parsed.
    FixedWidthField {
        field: &'static str,
        content: String,
    },
    /// An ARL record label carries an unexpected variable name.
    UnexpectedLabel { expected: String, found: String },
    /// The ARL index table is shorter than its declared length.
    IndexTruncated,
}

impl fmt::Display for FormatError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use self::FormatError::*;
        match *self {
            ImageFileDirectoryNotFound => write!(fmt, "image file directory not found"),
            CycleInOffsets(offset) => write!(fmt, "IFD offset {} was already visited", offset),
            InconsistentSizesEncountered => write!(fmt, "inconsistent sizes encountered"),
            InvalidTagValue(tag) => write!(fmt, "tag {:?} has an invalid value", tag),
            GeoKeyDirectoryTruncated { expected, found } => write!(
                fmt,
                "GeoKey directory holds {} values, header requires {}",
                found, expected
            ),
            FixedWidthField { field, ref content } => {
                write!(fmt, "field `{}` is not numeric: {:?}", field, content)
            }
            UnexpectedLabel {
                ref expected,
                ref found,
            } => write!(fmt, "expected record `{}`, found `{}`", expected, found),
            IndexTruncated => write!(fmt, "level/variable index is truncated"),
        }
    }
}

/// The file uses a feature which is not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UnsupportedError {
    CompressionMethod(CompressionMethod),
    FeatureDisabled(&'static str),
    SampleLayout {
        bits_per_sample: u16,
        format: SampleFormat,
    },
    MixedBitsPerSample(Vec<u16>),
    PlanarConfiguration(u16),
    Predictor(u16),
    RotatedTransform,
}

impl fmt::Display for UnsupportedError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use self::UnsupportedError::*;
        match *self {
            CompressionMethod(method) => write!(fmt, "compression method {:?}", method),
            FeatureDisabled(feature) => {
                write!(fmt, "the `{}` feature of this crate is disabled", feature)
            }
            SampleLayout {
                bits_per_sample,
                format,
            } => write!(fmt, "{}-bit samples of format {:?}", bits_per_sample, format),
            MixedBitsPerSample(ref bits) => write!(fmt, "mixed bits per sample {:?}", bits),
            PlanarConfiguration(config) => write!(fmt, "planar configuration {}", config),
            Predictor(p) => write!(fmt, "predictor {}", p),
            RotatedTransform => write!(fmt, "rotated or sheared model transformation"),
        }
    }
}

/// User attempted to use the codec in a way that is incompatible with a
/// specific file.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum UsageError {
    PayloadMismatch(Type),
    NonLatin1Text,
    DataSizeMismatch { expected: usize, found: usize },
    ImageIndexOutOfRange(usize),
    TimeIndexOutOfRange(usize),
    UnknownLevel(usize),
    UnknownVariable { level: usize, variable: String },
    NoOpenTimeStep,
    EmptyDirectory,
    /// A value does not fit into its fixed-width text field.
    FieldTooWide { field: &'static str, value: String },
}

impl fmt::Display for UsageError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use self::UsageError::*;
        match *self {
            PayloadMismatch(ty) => write!(fmt, "payload does not match field type {:?}", ty),
            NonLatin1Text => write!(fmt, "text contains characters outside Latin-1"),
            DataSizeMismatch { expected, found } => {
                write!(fmt, "expected {} values, found {}", expected, found)
            }
            ImageIndexOutOfRange(n) => write!(fmt, "no image with index {}", n),
            TimeIndexOutOfRange(n) => write!(fmt, "no time step with index {}", n),
            UnknownLevel(l) => write!(fmt, "no level with index {}", l),
            UnknownVariable { level, ref variable } => {
                write!(fmt, "variable `{}` is not stored on level {}", variable, level)
            }
            NoOpenTimeStep => write!(fmt, "no time step has been started"),
            EmptyDirectory => write!(fmt, "an image directory needs at least one entry"),
            FieldTooWide { field, ref value } => {
                write!(fmt, "value {} does not fit into field `{}`", value, field)
            }
        }
    }
}

/// Result of a decoding/encoding process
pub type CodecResult<T> = Result<T, CodecError>;
