//! Compression of strip payloads when writing.

use std::io;

use crate::tags::CompressionMethod;

#[cfg(feature = "deflate")]
mod deflate;
#[cfg(feature = "lzw")]
mod lzw;

#[cfg(feature = "deflate")]
pub use self::deflate::DeflateLevel;

/// An algorithm used to compress the strips written by
/// [`GeoTiffWriter`](super::GeoTiffWriter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Compression {
    #[default]
    None,
    #[cfg(feature = "lzw")]
    Lzw,
    #[cfg(feature = "deflate")]
    Deflate(DeflateLevel),
}

impl Compression {
    /// The value of the Compression tag for this algorithm.
    pub fn method(&self) -> CompressionMethod {
        match *self {
            Compression::None => CompressionMethod::None,
            #[cfg(feature = "lzw")]
            Compression::Lzw => CompressionMethod::LZW,
            #[cfg(feature = "deflate")]
            Compression::Deflate(_) => CompressionMethod::Deflate,
        }
    }

    /// Compress one strip.
    pub fn compress(&self, bytes: &[u8]) -> io::Result<Vec<u8>> {
        match *self {
            Compression::None => Ok(bytes.to_vec()),
            #[cfg(feature = "lzw")]
            Compression::Lzw => lzw::compress(bytes),
            #[cfg(feature = "deflate")]
            Compression::Deflate(level) => deflate::compress(bytes, level),
        }
    }
}
