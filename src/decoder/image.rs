//! Placement of decoded strips and tiles into the output raster.

use half::f16;

use super::stream::ByteOrder;
use super::RasterData;
use crate::error::{CodecResult, UnsupportedError};
use crate::tags::SampleFormat;

/// Geometry of the chunks (strips or tiles) an image is split into.
///
/// Strips are handled as tiles that span the full image width. All sizes
/// are in pixels except where noted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkLayout {
    pub image_width: usize,
    pub image_height: usize,
    pub chunk_width: usize,
    pub chunk_height: usize,
    /// Bytes of one pixel, over all samples.
    pub pixel_bytes: usize,
}

impl ChunkLayout {
    pub fn strips(width: usize, height: usize, rows_per_strip: usize, pixel_bytes: usize) -> Self {
        ChunkLayout {
            image_width: width,
            image_height: height,
            chunk_width: width,
            chunk_height: rows_per_strip.clamp(1, height.max(1)),
            pixel_bytes,
        }
    }

    pub fn tiles_across(&self) -> usize {
        (self.image_width + self.chunk_width - 1) / self.chunk_width
    }

    pub fn tiles_down(&self) -> usize {
        (self.image_height + self.chunk_height - 1) / self.chunk_height
    }

    pub fn chunk_count(&self) -> usize {
        self.tiles_across() * self.tiles_down()
    }

    /// Bytes of one full, unclipped chunk, `None` on overflow.
    pub fn chunk_bytes(&self) -> Option<usize> {
        self.chunk_width
            .checked_mul(self.chunk_height)?
            .checked_mul(self.pixel_bytes)
    }

    /// Bytes of one row of the output image.
    pub fn image_row_bytes(&self) -> usize {
        self.image_width * self.pixel_bytes
    }

    /// Copy chunk `index` into `image`, discarding the parts of edge chunks
    /// that lie outside of the image.
    ///
    /// Chunks are numbered row major: the horizontal index varies fastest.
    pub fn copy_chunk(&self, index: usize, chunk: &[u8], image: &mut [u8]) {
        let across = self.tiles_across();
        let x0 = (index % across) * self.chunk_width;
        let y0 = (index / across) * self.chunk_height;

        let cols = self.chunk_width.min(self.image_width.saturating_sub(x0));
        let rows = self.chunk_height.min(self.image_height.saturating_sub(y0));
        let chunk_row_bytes = self.chunk_width * self.pixel_bytes;
        let copy_bytes = cols * self.pixel_bytes;
        let image_row_bytes = self.image_row_bytes();

        for row in 0..rows {
            let src = row * chunk_row_bytes;
            let dst = (y0 + row) * image_row_bytes + x0 * self.pixel_bytes;
            image[dst..dst + copy_bytes].copy_from_slice(&chunk[src..src + copy_bytes]);
        }
    }
}

macro_rules! rev_hpredict {
    ($buf:expr, $row_bytes:expr, $samples:expr, $ty:ty, $byte_order:expr) => {{
        const N: usize = std::mem::size_of::<$ty>();
        let load = |b: &[u8]| -> $ty {
            let mut n = [0u8; N];
            n.copy_from_slice(b);
            match $byte_order {
                ByteOrder::LittleEndian => <$ty>::from_le_bytes(n),
                ByteOrder::BigEndian => <$ty>::from_be_bytes(n),
            }
        };
        let store = |v: $ty| match $byte_order {
            ByteOrder::LittleEndian => v.to_le_bytes(),
            ByteOrder::BigEndian => v.to_be_bytes(),
        };
        let stride = $samples * N;
        for row in $buf.chunks_exact_mut($row_bytes) {
            for i in (stride..row.len()).step_by(N) {
                let prev = load(&row[i - stride..i - stride + N]);
                let cur = load(&row[i..i + N]);
                row[i..i + N].copy_from_slice(&store(cur.wrapping_add(prev)));
            }
        }
    }};
}

/// Undo horizontal differencing (Predictor = 2) on one decompressed chunk.
///
/// Each sample in a row holds the difference to the same sample of the
/// pixel to its left; differences wrap at the sample width.
pub(crate) fn rev_hpredict(
    buf: &mut [u8],
    chunk_width: usize,
    samples: usize,
    sample_bytes: usize,
    byte_order: ByteOrder,
) {
    let row_bytes = chunk_width * samples * sample_bytes;
    if row_bytes == 0 {
        return;
    }
    match sample_bytes {
        1 => rev_hpredict!(buf, row_bytes, samples, u8, byte_order),
        2 => rev_hpredict!(buf, row_bytes, samples, u16, byte_order),
        4 => rev_hpredict!(buf, row_bytes, samples, u32, byte_order),
        _ => rev_hpredict!(buf, row_bytes, samples, u64, byte_order),
    }
}

/// Reverse the row order of an image buffer in place.
pub(crate) fn flip_rows(buf: &mut [u8], row_bytes: usize) {
    if row_bytes == 0 {
        return;
    }
    let rows = buf.len() / row_bytes;
    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        let (head, tail) = buf.split_at_mut(bottom * row_bytes);
        head[top * row_bytes..(top + 1) * row_bytes].swap_with_slice(&mut tail[..row_bytes]);
    }
}

/// The in-memory sample type selected by BitsPerSample and SampleFormat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SampleKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F16,
    F32,
    F64,
}

impl SampleKind {
    pub fn new(bits_per_sample: u16, format: SampleFormat) -> CodecResult<SampleKind> {
        let kind = match (format, bits_per_sample) {
            (SampleFormat::Uint | SampleFormat::Void, 8) => SampleKind::U8,
            (SampleFormat::Int, 8) => SampleKind::I8,
            (SampleFormat::Uint | SampleFormat::Void, 16) => SampleKind::U16,
            (SampleFormat::Int, 16) => SampleKind::I16,
            (SampleFormat::Uint | SampleFormat::Void, 32) => SampleKind::U32,
            (SampleFormat::Int, 32) => SampleKind::I32,
            (SampleFormat::IEEEFP, 16) => SampleKind::F16,
            (SampleFormat::IEEEFP, 32) => SampleKind::F32,
            (SampleFormat::IEEEFP, 64) => SampleKind::F64,
            _ => {
                return Err(UnsupportedError::SampleLayout {
                    bits_per_sample,
                    format,
                }
                .into())
            }
        };
        Ok(kind)
    }

    pub fn bytes(self) -> usize {
        match self {
            SampleKind::U8 | SampleKind::I8 => 1,
            SampleKind::U16 | SampleKind::I16 | SampleKind::F16 => 2,
            SampleKind::U32 | SampleKind::I32 | SampleKind::F32 => 4,
            SampleKind::F64 => 8,
        }
    }

    /// Interpret raw file bytes as samples of this kind.
    pub fn decode(self, bytes: &[u8], byte_order: ByteOrder) -> RasterData {
        macro_rules! samples {
            ($ty:ty) => {
                bytes
                    .chunks_exact(std::mem::size_of::<$ty>())
                    .map(|b| {
                        let mut n = [0u8; std::mem::size_of::<$ty>()];
                        n.copy_from_slice(b);
                        match byte_order {
                            ByteOrder::LittleEndian => <$ty>::from_le_bytes(n),
                            ByteOrder::BigEndian => <$ty>::from_be_bytes(n),
                        }
                    })
                    .collect::<Vec<$ty>>()
            };
        }
        match self {
            SampleKind::U8 => RasterData::U8(bytes.to_vec()),
            SampleKind::I8 => RasterData::I8(bytes.iter().map(|&b| b as i8).collect()),
            SampleKind::U16 => RasterData::U16(samples!(u16)),
            SampleKind::I16 => RasterData::I16(samples!(i16)),
            SampleKind::U32 => RasterData::U32(samples!(u32)),
            SampleKind::I32 => RasterData::I32(samples!(i32)),
            SampleKind::F16 => RasterData::F32(
                samples!(u16)
                    .into_iter()
                    .map(|bits| f16::from_bits(bits).to_f32())
                    .collect(),
            ),
            SampleKind::F32 => RasterData::F32(samples!(f32)),
            SampleKind::F64 => RasterData::F64(samples!(f64)),
        }
    }
}
