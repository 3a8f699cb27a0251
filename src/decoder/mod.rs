//! Reading of GeoTIFF files.
//!
//! [`GeoTiffReader`] parses the header and every image file directory of a
//! file up front. Pixel data is decoded on demand with
//! [`GeoTiffReader::read_array`].

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::{debug, warn};

use self::compression::decompressor_for;
use self::image::{flip_rows, rev_hpredict, ChunkLayout, SampleKind};
use self::stream::{ByteOrder, EndianReader, SmartReader};
use crate::directory::Directory;
use crate::error::{CodecError, CodecResult, FormatError, UnsupportedError, UsageError};
use crate::geo::{self, GeoKey, GeoKeyId, GeoTransform, RasterType};
use crate::ifd::DirectoryEntry;
use crate::tags::{CompressionMethod, PlanarConfiguration, Predictor, SampleFormat, Tag, Type};

pub mod compression;
mod image;
pub mod stream;

/// Decoding limits
#[derive(Clone, Debug)]
pub struct Limits {
    /// The maximum size of a decoded raster in bytes, the default is
    /// 256MiB.
    pub decoding_buffer_size: usize,
    /// The maximum size of any ifd value in bytes, the default is
    /// 1MiB.
    pub ifd_value_size: usize,
    /// Maximum size of one compressed strip or tile as read from the file,
    /// the default is 128MiB.
    pub intermediate_buffer_size: usize,
    /// The purpose of this is to prevent all the fields of the struct from
    /// being public, as this would make adding new fields a major version
    /// bump.
    _non_exhaustive: (),
}

impl Limits {
    /// A configuration that does not impose any limits.
    ///
    /// This is a good start if the caller only wants to impose selective limits, contrary to the
    /// default limits which allows selectively disabling limits.
    pub fn unlimited() -> Limits {
        Limits {
            decoding_buffer_size: usize::MAX,
            ifd_value_size: usize::MAX,
            intermediate_buffer_size: usize::MAX,
            _non_exhaustive: (),
        }
    }
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            decoding_buffer_size: 256 * 1024 * 1024,
            intermediate_buffer_size: 128 * 1024 * 1024,
            ifd_value_size: 1024 * 1024,
            _non_exhaustive: (),
        }
    }
}

/// Decoded samples of a raster, typed after BitsPerSample and SampleFormat.
///
/// 16-bit floats are widened to `F32`.
#[derive(Clone, Debug, PartialEq)]
pub enum RasterData {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl RasterData {
    pub fn len(&self) -> usize {
        match *self {
            RasterData::U8(ref v) => v.len(),
            RasterData::I8(ref v) => v.len(),
            RasterData::U16(ref v) => v.len(),
            RasterData::I16(ref v) => v.len(),
            RasterData::U32(ref v) => v.len(),
            RasterData::I32(ref v) => v.len(),
            RasterData::F32(ref v) => v.len(),
            RasterData::F64(ref v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sample at a flat index, widened to `f64`.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match *self {
            RasterData::U8(ref v) => v.get(index).map(|&s| f64::from(s)),
            RasterData::I8(ref v) => v.get(index).map(|&s| f64::from(s)),
            RasterData::U16(ref v) => v.get(index).map(|&s| f64::from(s)),
            RasterData::I16(ref v) => v.get(index).map(|&s| f64::from(s)),
            RasterData::U32(ref v) => v.get(index).map(|&s| f64::from(s)),
            RasterData::I32(ref v) => v.get(index).map(|&s| f64::from(s)),
            RasterData::F32(ref v) => v.get(index).map(|&s| f64::from(s)),
            RasterData::F64(ref v) => v.get(index).copied(),
        }
    }
}

/// A decoded image, `height` rows of `width` pixels of `samples` interleaved
/// samples each.
///
/// Row 0 is the southern edge of the image, which is the last row stored in
/// the file.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub samples: usize,
    pub data: RasterData,
}

impl Raster {
    /// The sample of `band` at (`row`, `col`), widened to `f64`.
    pub fn get(&self, row: usize, col: usize, band: usize) -> Option<f64> {
        if row >= self.height || col >= self.width || band >= self.samples {
            return None;
        }
        self.data
            .get_f64((row * self.width + col) * self.samples + band)
    }
}

#[derive(Debug)]
struct Image {
    directory: Directory,
    geo_keys: Vec<GeoKey>,
}

/// Reader of GeoTIFF files.
///
/// All directories are read when the reader is created; afterwards the
/// metadata is immutable.
#[derive(Debug)]
pub struct GeoTiffReader<R> {
    reader: SmartReader<R>,
    limits: Limits,
    images: Vec<Image>,
}

impl GeoTiffReader<BufReader<File>> {
    /// Open the file at `path` with default limits.
    pub fn open<P: AsRef<Path>>(path: P) -> CodecResult<Self> {
        let file = File::open(path)?;
        GeoTiffReader::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> GeoTiffReader<R> {
    /// Create a new reader with default limits.
    pub fn new(r: R) -> CodecResult<GeoTiffReader<R>> {
        GeoTiffReader::with_limits(r, Limits::default())
    }

    pub fn with_limits(mut r: R, limits: Limits) -> CodecResult<GeoTiffReader<R>> {
        let mut marker = [0u8; 2];
        r.read_exact(&mut marker)?;
        let byte_order = ByteOrder::from_marker(marker);

        let mut reader = SmartReader::wrap(r, byte_order);
        let version = reader.read_u16()?;
        if version != 42 {
            warn!("TIFF version {} is not 42, reading on", version);
        }
        let first_ifd = u64::from(reader.read_u32()?);
        if first_ifd == 0 {
            return Err(FormatError::ImageFileDirectoryNotFound.into());
        }

        let mut decoder = GeoTiffReader {
            reader,
            limits,
            images: Vec::new(),
        };
        decoder.read_directories(first_ifd)?;
        Ok(decoder)
    }

    fn read_directories(&mut self, first_ifd: u64) -> CodecResult<()> {
        let mut seen = HashSet::new();
        let mut next = Some(first_ifd);

        while let Some(offset) = next {
            if !seen.insert(offset) {
                return Err(FormatError::CycleInOffsets(offset).into());
            }
            let directory = self.read_ifd(offset)?;
            let geo_keys = geo::parse_geo_keys(&directory)?;
            debug!(
                "IFD at {} with {} entries and {} GeoKeys",
                offset,
                directory.len(),
                geo_keys.len()
            );
            next = directory.next();
            self.images.push(Image {
                directory,
                geo_keys,
            });
        }
        Ok(())
    }

    fn read_ifd(&mut self, offset: u64) -> CodecResult<Directory> {
        let reader = &mut self.reader;
        reader.goto_offset(offset)?;

        let count = reader.read_u16()?;
        let mut raw = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let tag = reader.read_u16()?;
            let field_type = reader.read_u16()?;
            let value_count = reader.read_u32()?;
            let mut value = [0u8; 4];
            reader.read_exact(&mut value)?;
            raw.push((tag, field_type, value_count, value));
        }
        let next = reader.read_u32()?;

        let mut directory = Directory::empty();
        for (code, type_code, count, value) in raw {
            let tag = Tag::from_u16_exhaustive(code);
            let Some(field_type) = Type::from_u16(type_code) else {
                warn!("skipping tag {:?} with unknown field type {}", tag, type_code);
                continue;
            };
            let len = field_type
                .value_bytes(count)
                .ok_or(CodecError::LimitsExceeded)?;

            let entry = if len <= 4 {
                DirectoryEntry::decode(tag, field_type, count, &value, reader.byte_order)?
            } else {
                if len > self.limits.ifd_value_size as u64 {
                    return Err(CodecError::LimitsExceeded);
                }
                let value_offset = match reader.byte_order {
                    ByteOrder::LittleEndian => u32::from_le_bytes(value),
                    ByteOrder::BigEndian => u32::from_be_bytes(value),
                };
                let mut bytes = vec![0u8; usize::try_from(len)?];
                reader.goto_offset(u64::from(value_offset))?;
                reader.read_exact(&mut bytes)?;
                DirectoryEntry::decode(tag, field_type, count, &bytes, reader.byte_order)?
            };
            directory.insert(entry);
        }
        directory.set_next(Some(u64::from(next)));
        Ok(directory)
    }

    /// Decode the pixels of image `index`.
    ///
    /// The rows are returned bottom-up: row 0 of the result is the last row
    /// of the image as stored in the file.
    pub fn read_array(&mut self, index: usize) -> CodecResult<Raster> {
        let dir = &self
            .images
            .get(index)
            .ok_or(UsageError::ImageIndexOutOfRange(index))?
            .directory;

        let width = usize::try_from(required(dir, Tag::ImageWidth)?.first_u64()?)?;
        let height = usize::try_from(required(dir, Tag::ImageLength)?.first_u64()?)?;
        let samples = optional_u64(dir, Tag::SamplesPerPixel)?.unwrap_or(1) as usize;
        let kind = sample_kind(dir)?;

        let planar = optional_u64(dir, Tag::PlanarConfiguration)?.unwrap_or(1);
        if samples > 1 && planar != PlanarConfiguration::Chunky.to_u16() as u64 {
            return Err(UnsupportedError::PlanarConfiguration(planar as u16).into());
        }

        let predictor = optional_u64(dir, Tag::Predictor)?.unwrap_or(1) as u16;
        let predictor = match Predictor::from_u16(predictor) {
            Some(p) => p,
            None => return Err(UnsupportedError::Predictor(predictor).into()),
        };

        let method = optional_u64(dir, Tag::Compression)?.unwrap_or(1) as u16;
        let decompressor = decompressor_for(CompressionMethod::from_u16_exhaustive(method))?;

        if width == 0 || height == 0 || samples == 0 {
            return Ok(Raster {
                width,
                height,
                samples,
                data: kind.decode(&[], self.reader.byte_order),
            });
        }

        let pixel_bytes = samples * kind.bytes();
        let (layout, offsets, byte_counts) = if dir.contains(Tag::TileOffsets) {
            let layout = ChunkLayout {
                image_width: width,
                image_height: height,
                chunk_width: usize::try_from(required(dir, Tag::TileWidth)?.first_u64()?)?,
                chunk_height: usize::try_from(required(dir, Tag::TileLength)?.first_u64()?)?,
                pixel_bytes,
            };
            if layout.chunk_width == 0 || layout.chunk_height == 0 {
                return Err(FormatError::InvalidTagValue(Tag::TileWidth).into());
            }
            (
                layout,
                required(dir, Tag::TileOffsets)?.to_u64_vec()?,
                required(dir, Tag::TileByteCounts)?.to_u64_vec()?,
            )
        } else {
            let rows_per_strip = optional_u64(dir, Tag::RowsPerStrip)?
                .map(usize::try_from)
                .transpose()?
                .unwrap_or(height);
            (
                ChunkLayout::strips(width, height, rows_per_strip, pixel_bytes),
                required(dir, Tag::StripOffsets)?.to_u64_vec()?,
                required(dir, Tag::StripByteCounts)?.to_u64_vec()?,
            )
        };

        let total = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(pixel_bytes))
            .ok_or(CodecError::LimitsExceeded)?;
        if total > self.limits.decoding_buffer_size {
            return Err(CodecError::LimitsExceeded);
        }

        let chunk_bytes = layout
            .chunk_bytes()
            .filter(|&bytes| bytes <= self.limits.intermediate_buffer_size)
            .ok_or(CodecError::LimitsExceeded)?;

        let chunks = layout.chunk_count();
        if offsets.len() < chunks || byte_counts.len() < chunks {
            return Err(FormatError::InconsistentSizesEncountered.into());
        }
        debug!(
            "decoding {}x{}x{} {:?} samples from {} chunks of {}x{}",
            width, height, samples, kind, chunks, layout.chunk_width, layout.chunk_height
        );

        let mut image = vec![0u8; total];
        let mut compressed = Vec::new();
        for (index, (&offset, &byte_count)) in offsets.iter().zip(&byte_counts).take(chunks).enumerate()
        {
            let byte_count = usize::try_from(byte_count)?;
            if byte_count > self.limits.intermediate_buffer_size {
                return Err(CodecError::LimitsExceeded);
            }
            compressed.resize(byte_count, 0);
            self.reader.goto_offset(offset)?;
            self.reader.read_exact(&mut compressed)?;

            let mut chunk = decompressor.decompress(&compressed, chunk_bytes)?;
            if predictor == Predictor::Horizontal {
                rev_hpredict(
                    &mut chunk,
                    layout.chunk_width,
                    samples,
                    kind.bytes(),
                    self.reader.byte_order,
                );
            }
            layout.copy_chunk(index, &chunk, &mut image);
        }

        flip_rows(&mut image, layout.image_row_bytes());
        Ok(Raster {
            width,
            height,
            samples,
            data: kind.decode(&image, self.reader.byte_order),
        })
    }

    /// Unwrap the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<R> GeoTiffReader<R> {
    pub fn byte_order(&self) -> ByteOrder {
        self.reader.byte_order
    }

    /// Number of images (IFDs) in the file.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn directory(&self, index: usize) -> Option<&Directory> {
        self.images.get(index).map(|image| &image.directory)
    }

    /// The directory of every image in file order.
    pub fn directories(&self) -> impl Iterator<Item = &Directory> + '_ {
        self.images.iter().map(|image| &image.directory)
    }

    /// The entries of an image, in ascending tag order.
    pub fn tags(&self, index: usize) -> Vec<&DirectoryEntry> {
        self.directory(index)
            .map(|dir| dir.iter().collect())
            .unwrap_or_default()
    }

    /// The expanded GeoKeys of an image, in directory order.
    pub fn geo_keys(&self, index: usize) -> &[GeoKey] {
        self.images
            .get(index)
            .map(|image| &image.geo_keys[..])
            .unwrap_or(&[])
    }

    /// The no-data value from `GDALNoDataTag`, if present and numeric.
    pub fn nodata(&self, index: usize) -> Option<f64> {
        let text = self.directory(index)?.get(Tag::GdalNodata)?.as_str()?;
        let text = text.trim_end_matches('\0').trim();
        match text.parse::<f64>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("GDAL no-data value {:?} is not a number", text);
                None
            }
        }
    }

    /// PROJ parameters of the projected coordinate system of an image.
    ///
    /// `None` means the coordinates should be taken as WGS 84 longitude and
    /// latitude.
    pub fn projection(&self, index: usize) -> Option<String> {
        geo::projection(self.geo_keys(index))
    }

    pub fn geo_transform(&self, index: usize) -> CodecResult<Option<GeoTransform>> {
        match self.directory(index) {
            Some(dir) => GeoTransform::from_directory(dir),
            None => Err(UsageError::ImageIndexOutOfRange(index).into()),
        }
    }

    /// `GTRasterTypeGeoKey`, PixelIsArea if absent.
    pub fn raster_type(&self, index: usize) -> RasterType {
        geo::find_key(self.geo_keys(index), GeoKeyId::GTRasterTypeGeoKey)
            .and_then(GeoKey::as_short)
            .and_then(RasterType::from_u16)
            .unwrap_or(RasterType::PixelIsArea)
    }

    /// X and Y coordinates of the columns and rows of an image, in the
    /// orientation returned by [`read_array`](Self::read_array).
    pub fn coordinates(&self, index: usize) -> CodecResult<Option<(Vec<f64>, Vec<f64>)>> {
        let Some(transform) = self.geo_transform(index)? else {
            return Ok(None);
        };
        let dir = self
            .directory(index)
            .ok_or(UsageError::ImageIndexOutOfRange(index))?;
        let width = usize::try_from(required(dir, Tag::ImageWidth)?.first_u64()?)?;
        let height = usize::try_from(required(dir, Tag::ImageLength)?.first_u64()?)?;
        let raster_type = self.raster_type(index);
        Ok(Some((
            transform.x_coordinates(width, raster_type)?,
            transform.y_coordinates(height, raster_type)?,
        )))
    }
}

fn required(dir: &Directory, tag: Tag) -> CodecResult<&DirectoryEntry> {
    dir.get(tag).ok_or(CodecError::MissingTag(tag))
}

fn optional_u64(dir: &Directory, tag: Tag) -> CodecResult<Option<u64>> {
    dir.get(tag).map(DirectoryEntry::first_u64).transpose()
}

fn sample_kind(dir: &Directory) -> CodecResult<SampleKind> {
    let bits = required(dir, Tag::BitsPerSample)?.to_u64_vec()?;
    let first = *bits
        .first()
        .ok_or(FormatError::InvalidTagValue(Tag::BitsPerSample))?;
    if bits.iter().any(|&b| b != first) {
        return Err(UnsupportedError::MixedBitsPerSample(
            bits.iter().map(|&b| b as u16).collect(),
        )
        .into());
    }
    let format = optional_u64(dir, Tag::SampleFormat)?.unwrap_or(1) as u16;
    SampleKind::new(first as u16, SampleFormat::from_u16_exhaustive(format))
}
