//! Decompression of strip and tile payloads.

use std::io::Read;

use crate::error::{CodecError, CodecResult, UnsupportedError};
use crate::tags::CompressionMethod;

#[cfg(feature = "deflate")]
use super::stream::DeflateReader;
#[cfg(feature = "lzw")]
use super::stream::LZWReader;

/// Expands one compressed chunk.
///
/// `expected_len` is the byte size of the uncompressed tile or strip. The
/// returned buffer always has exactly that length: short output is padded
/// with zeros and excess output is dropped.
pub trait Decompressor {
    fn decompress(&self, input: &[u8], expected_len: usize) -> CodecResult<Vec<u8>>;
}

/// Chunks stored without compression.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncompressed;

impl Decompressor for Uncompressed {
    fn decompress(&self, input: &[u8], expected_len: usize) -> CodecResult<Vec<u8>> {
        let mut out = input[..input.len().min(expected_len)].to_vec();
        out.resize(expected_len, 0);
        Ok(out)
    }
}

/// TIFF flavoured LZW (MSB bit order, early code size switch).
#[cfg(feature = "lzw")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Lzw;

#[cfg(feature = "lzw")]
impl Decompressor for Lzw {
    fn decompress(&self, input: &[u8], expected_len: usize) -> CodecResult<Vec<u8>> {
        read_padded(LZWReader::new(input, input.len()), expected_len)
    }
}

/// zlib wrapped Deflate, used for both the Adobe and the old Deflate codes.
#[cfg(feature = "deflate")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Deflate;

#[cfg(feature = "deflate")]
impl Decompressor for Deflate {
    fn decompress(&self, input: &[u8], expected_len: usize) -> CodecResult<Vec<u8>> {
        read_padded(DeflateReader::new(input), expected_len)
    }
}

#[allow(dead_code)]
fn read_padded<R: Read>(reader: R, expected_len: usize) -> CodecResult<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    reader
        .take(expected_len as u64)
        .read_to_end(&mut out)
        .map_err(|err| CodecError::Decompression(err.to_string()))?;
    if out.len() < expected_len {
        log::debug!(
            "chunk expanded to {} of {} bytes, padding with zeros",
            out.len(),
            expected_len
        );
        out.resize(expected_len, 0);
    }
    Ok(out)
}

/// Select the decompressor registered for a compression method.
pub fn decompressor_for(method: CompressionMethod) -> CodecResult<Box<dyn Decompressor>> {
    match method {
        CompressionMethod::None => Ok(Box::new(Uncompressed)),
        #[cfg(feature = "lzw")]
        CompressionMethod::LZW => Ok(Box::new(Lzw)),
        #[cfg(not(feature = "lzw"))]
        CompressionMethod::LZW => Err(UnsupportedError::FeatureDisabled("lzw").into()),
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflate | CompressionMethod::OldDeflate => Ok(Box::new(Deflate)),
        #[cfg(not(feature = "deflate"))]
        CompressionMethod::Deflate | CompressionMethod::OldDeflate => {
            Err(UnsupportedError::FeatureDisabled("deflate").into())
        }
        method => Err(UnsupportedError::CompressionMethod(method).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_pads_and_truncates() {
        let out = Uncompressed.decompress(&[1, 2, 3], 5).unwrap();
        assert_eq!(out, vec![1, 2, 3, 0, 0]);
        let out = Uncompressed.decompress(&[1, 2, 3], 2).unwrap();
        assert_eq!(out, vec![1, 2]);
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn deflate_pads_short_output() {
        use flate2::{write::ZlibEncoder, Compression};
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[7u8; 10]).unwrap();
        let compressed = encoder.finish().unwrap();

        let out = Deflate.decompress(&compressed, 16).unwrap();
        assert_eq!(&out[..10], &[7u8; 10]);
        assert_eq!(&out[10..], &[0u8; 6]);
    }

    #[cfg(feature = "lzw")]
    #[test]
    fn lzw_round_trip() {
        let data: Vec<u8> = (0..200u32).map(|i| (i % 17) as u8).collect();
        let mut encoder = weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
        let compressed = encoder.encode(&data).unwrap();

        let out = Lzw.decompress(&compressed, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn corrupt_deflate_is_an_error() {
        let result = Deflate.decompress(&[0xde, 0xad, 0xbe, 0xef, 0x00], 16);
        assert!(matches!(result, Err(CodecError::Decompression(_))));
    }

    #[test]
    fn unknown_method_is_unsupported() {
        let result = decompressor_for(CompressionMethod::Unknown(7));
        assert!(matches!(result, Err(CodecError::Unsupported(_))));
    }
}
