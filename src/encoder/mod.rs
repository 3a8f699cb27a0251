//! Writing of GeoTIFF files.
//!
//! A [`GeoTiffWriter`] accumulates the tags and GeoKeys of one image, writes
//! its pixel data and then its directory with
//! [`write_metadata`](GeoTiffWriter::write_metadata). Repeating these steps
//! appends further images to the chain of directories.

use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use log::{debug, warn};

use crate::decoder::stream::ByteOrder;
use crate::directory::Directory;
use crate::error::{CodecResult, UsageError};
use crate::geo::{encode_geo_keys, GeoKey, GeoTransform};
use crate::ifd::DirectoryEntry;
use crate::tags::{PlanarConfiguration, Tag};

pub mod compression;
mod sample;
pub mod writer;

pub use self::compression::Compression;
#[cfg(feature = "deflate")]
pub use self::compression::DeflateLevel;
pub use self::sample::Sample;
use self::writer::TiffWriter;

/// Offset of the first-IFD pointer in the file header.
const FIRST_IFD_POINTER: u64 = 4;
const HEADER_LEN: u64 = 8;
/// Target size of one uncompressed strip.
const STRIP_BYTES: usize = 8192;
/// PhotometricInterpretation for single band data.
const BLACK_IS_ZERO: u16 = 1;

/// Writer of GeoTIFF files.
///
/// Values too large for the 4 byte slot of a directory entry are written
/// after the directory. Data only ever grows at the end of the file; the
/// position of that end is truncated to on [`close`](GeoTiffWriter::close).
pub struct GeoTiffWriter<W: Write + Seek> {
    writer: TiffWriter<W>,
    directory: Directory,
    geo_keys: Vec<GeoKey>,
    compression: Compression,
    /// Position of the next-IFD pointer of the last directory written.
    last_next_pointer: Option<u64>,
    /// End of the data written so far.
    cursor: u64,
}

impl GeoTiffWriter<File> {
    /// Create a little endian file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> CodecResult<Self> {
        Self::create_with_byte_order(path, ByteOrder::LittleEndian)
    }

    pub fn create_with_byte_order<P: AsRef<Path>>(
        path: P,
        byte_order: ByteOrder,
    ) -> CodecResult<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        GeoTiffWriter::new(file, byte_order)
    }

    /// Flush the file to disk and cut it at the end of the written data.
    pub fn close(mut self) -> CodecResult<()> {
        self.warn_pending();
        self.writer.flush()?;
        let file = self.writer.get_ref();
        file.set_len(self.cursor)?;
        file.sync_all()?;
        Ok(())
    }
}

impl<W: Write + Seek> GeoTiffWriter<W> {
    /// Start a file on `writer`, which must be positioned at the start of an
    /// empty stream.
    pub fn new(writer: W, byte_order: ByteOrder) -> CodecResult<Self> {
        let mut writer = TiffWriter::new(writer, byte_order);
        writer.goto_offset(0)?;
        writer.write_bytes(&byte_order.marker())?;
        writer.write_u16(42)?;
        // Patched by the first `write_metadata`.
        writer.write_u32(0)?;

        Ok(GeoTiffWriter {
            writer,
            directory: Directory::empty(),
            geo_keys: Vec::new(),
            compression: Compression::default(),
            last_next_pointer: None,
            cursor: HEADER_LEN,
        })
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.writer.byte_order()
    }

    /// Compression applied to the strips written from now on.
    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    /// Add an entry to the current image, replacing an entry with the same tag.
    pub fn add_tag(&mut self, entry: DirectoryEntry) {
        self.directory.insert(entry);
    }

    /// Add a GeoKey to the current image. Keys are stored in insertion order.
    pub fn add_geo_key(&mut self, key: GeoKey) {
        self.geo_keys.push(key);
    }

    /// Store the model transformation of the current image.
    pub fn set_transform(&mut self, transform: &GeoTransform) {
        match *transform {
            GeoTransform::TiePoint { tie, scale } => {
                self.directory.remove(Tag::ModelTransformationTag);
                self.add_tag(DirectoryEntry::doubles(Tag::ModelTiepointTag, &tie));
                self.add_tag(DirectoryEntry::doubles(Tag::ModelPixelScaleTag, &scale));
            }
            GeoTransform::Affine(matrix) => {
                self.directory.remove(Tag::ModelTiepointTag);
                self.directory.remove(Tag::ModelPixelScaleTag);
                self.add_tag(DirectoryEntry::doubles(Tag::ModelTransformationTag, &matrix));
            }
        }
    }

    /// Store the no-data value of the current image in `GDALNoDataTag`.
    pub fn set_nodata(&mut self, nodata: f64) -> CodecResult<()> {
        self.add_tag(DirectoryEntry::ascii(Tag::GdalNodata, &nodata.to_string())?);
        Ok(())
    }

    /// Write `bytes` as the single strip of the current image.
    ///
    /// The caller provides the tags that describe the data. Returns the
    /// offset of the strip.
    pub fn write_data(&mut self, bytes: &[u8]) -> CodecResult<u64> {
        let (offset, byte_count) = self.write_strip(bytes)?;
        self.add_tag(DirectoryEntry::longs(Tag::StripOffsets, &[offset]));
        self.add_tag(DirectoryEntry::longs(Tag::StripByteCounts, &[byte_count]));
        self.add_tag(DirectoryEntry::shorts(
            Tag::Compression,
            &[self.compression.method().to_u16()],
        ));
        Ok(u64::from(offset))
    }

    /// Write a single band raster and the tags that describe it.
    ///
    /// `data` holds `height` rows of `width` samples with row 0 at the
    /// southern edge, as returned by
    /// [`GeoTiffReader::read_array`](crate::decoder::GeoTiffReader::read_array).
    pub fn write_raster<T: Sample>(&mut self, width: u32, height: u32, data: &[T]) -> CodecResult<()> {
        let row_len = width as usize;
        let expected = row_len * height as usize;
        if data.len() != expected {
            return Err(UsageError::DataSizeMismatch {
                expected,
                found: data.len(),
            }
            .into());
        }

        let row_bytes = (row_len * usize::from(T::BITS_PER_SAMPLE) / 8).max(1);
        let rows_per_strip = ((STRIP_BYTES + row_bytes - 1) / row_bytes).max(1);
        let byte_order = self.byte_order();

        let mut offsets = Vec::new();
        let mut byte_counts = Vec::new();
        let mut strip = Vec::with_capacity(rows_per_strip * row_bytes);
        // Rows are stored north to south.
        let rows: Vec<&[T]> = data.chunks(row_len.max(1)).rev().collect();
        for chunk in rows.chunks(rows_per_strip) {
            strip.clear();
            for row in chunk {
                for &sample in row.iter() {
                    sample.encode(byte_order, &mut strip);
                }
            }
            let (offset, byte_count) = self.write_strip(&strip)?;
            offsets.push(offset);
            byte_counts.push(byte_count);
        }

        self.add_tag(DirectoryEntry::longs(Tag::ImageWidth, &[width]));
        self.add_tag(DirectoryEntry::longs(Tag::ImageLength, &[height]));
        self.add_tag(DirectoryEntry::shorts(Tag::BitsPerSample, &[T::BITS_PER_SAMPLE]));
        self.add_tag(DirectoryEntry::shorts(Tag::SampleFormat, &[T::SAMPLE_FORMAT.to_u16()]));
        self.add_tag(DirectoryEntry::shorts(Tag::SamplesPerPixel, &[1]));
        self.add_tag(DirectoryEntry::longs(Tag::RowsPerStrip, &[u32::try_from(rows_per_strip)?]));
        self.add_tag(DirectoryEntry::shorts(
            Tag::Compression,
            &[self.compression.method().to_u16()],
        ));
        self.add_tag(DirectoryEntry::shorts(Tag::PhotometricInterpretation, &[BLACK_IS_ZERO]));
        self.add_tag(DirectoryEntry::shorts(
            Tag::PlanarConfiguration,
            &[PlanarConfiguration::Chunky.to_u16()],
        ));
        self.add_tag(DirectoryEntry::longs(Tag::StripOffsets, &offsets));
        self.add_tag(DirectoryEntry::longs(Tag::StripByteCounts, &byte_counts));
        Ok(())
    }

    /// Write the directory of the current image and link it into the file.
    ///
    /// Pending GeoKeys are encoded into their directory entries first. The
    /// first directory is linked from the file header, every later one from
    /// the next-IFD pointer of its predecessor. Returns the offset of the
    /// directory; afterwards a new, empty image is started.
    pub fn write_metadata(&mut self) -> CodecResult<u64> {
        if !self.geo_keys.is_empty() {
            let entries = encode_geo_keys(&self.geo_keys)?;
            self.directory.extend(entries);
        }
        if self.directory.is_empty() {
            return Err(UsageError::EmptyDirectory.into());
        }

        self.align()?;
        let ifd_offset = self.cursor;
        let byte_order = self.writer.byte_order();
        let count = self.directory.len();
        let mut overflow_offset = ifd_offset + 2 + 12 * count as u64 + 4;
        let mut overflow = Vec::new();

        self.writer.goto_offset(ifd_offset)?;
        self.writer.write_u16(u16::try_from(count)?)?;
        for entry in self.directory.iter() {
            let payload = entry.encode(byte_order)?;
            self.writer.write_u16(entry.tag().to_u16())?;
            self.writer.write_u16(entry.field_type().to_u16())?;
            self.writer.write_u32(entry.count())?;
            if payload.len() <= 4 {
                let mut slot = [0u8; 4];
                slot[..payload.len()].copy_from_slice(&payload);
                self.writer.write_bytes(&slot)?;
            } else {
                self.writer.write_u32(u32::try_from(overflow_offset)?)?;
                overflow_offset += (payload.len() + payload.len() % 2) as u64;
                overflow.push(payload);
            }
        }
        let next_pointer = self.writer.offset()?;
        self.writer.write_u32(0)?;
        for payload in overflow {
            self.writer.write_bytes(&payload)?;
            if payload.len() % 2 == 1 {
                self.writer.write_u8(0)?;
            }
        }
        self.cursor = self.writer.offset()?;
        debug!(
            "IFD with {} entries at {}, data ends at {}",
            count, ifd_offset, self.cursor
        );

        let link = self.last_next_pointer.unwrap_or(FIRST_IFD_POINTER);
        self.writer.goto_offset(link)?;
        self.writer.write_u32(u32::try_from(ifd_offset)?)?;
        self.last_next_pointer = Some(next_pointer);

        self.directory = Directory::empty();
        self.geo_keys.clear();
        Ok(ifd_offset)
    }

    /// Flush and return the underlying writer, without truncating it.
    pub fn into_inner(mut self) -> CodecResult<W> {
        self.warn_pending();
        self.writer.flush()?;
        Ok(self.writer.into_inner())
    }

    /// End of the data written so far.
    pub fn data_end(&self) -> u64 {
        self.cursor
    }

    fn write_strip(&mut self, bytes: &[u8]) -> CodecResult<(u32, u32)> {
        self.align()?;
        let compressed = self.compression.compress(bytes)?;
        let offset = self.cursor;
        self.writer.goto_offset(offset)?;
        self.writer.write_bytes(&compressed)?;
        self.cursor += compressed.len() as u64;
        Ok((u32::try_from(offset)?, u32::try_from(compressed.len())?))
    }

    /// Keep offsets on word boundaries.
    fn align(&mut self) -> CodecResult<()> {
        if self.cursor % 2 == 1 {
            self.writer.goto_offset(self.cursor)?;
            self.writer.write_u8(0)?;
            self.cursor += 1;
        }
        Ok(())
    }

    fn warn_pending(&self) {
        if !self.directory.is_empty() || !self.geo_keys.is_empty() {
            warn!(
                "discarding {} tags and {} GeoKeys without a written directory",
                self.directory.len(),
                self.geo_keys.len()
            );
        }
        if self.last_next_pointer.is_none() {
            warn!("no image directory was written");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::decoder::GeoTiffReader;

    #[test]
    fn header_points_to_first_directory() {
        let mut writer = GeoTiffWriter::new(Cursor::new(Vec::new()), ByteOrder::BigEndian).unwrap();
        writer.add_tag(DirectoryEntry::longs(Tag::ImageWidth, &[1]));
        let offset = writer.write_metadata().unwrap();
        assert_eq!(offset, 8);

        let bytes = writer.into_inner().unwrap().into_inner();
        assert_eq!(&bytes[..8], &[b'M', b'M', 0, 42, 0, 0, 0, 8]);
        // One entry, inline LONG, no next directory.
        assert_eq!(
            &bytes[8..],
            &[0, 1, 1, 0, 0, 4, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0]
        );
    }

    #[test]
    fn large_values_go_after_the_directory() {
        let mut writer =
            GeoTiffWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian).unwrap();
        writer.add_tag(DirectoryEntry::shorts(Tag::BitsPerSample, &[8, 8, 8]));
        writer.write_metadata().unwrap();
        let bytes = writer.into_inner().unwrap().into_inner();

        // Directory at 8: count, one entry, next pointer; values at 26.
        assert_eq!(&bytes[8..10], &[1, 0]);
        assert_eq!(&bytes[14..18], &[3, 0, 0, 0]);
        assert_eq!(&bytes[18..22], &[26, 0, 0, 0]);
        assert_eq!(&bytes[26..], &[8, 0, 8, 0, 8, 0]);
    }

    #[test]
    fn empty_directory_is_rejected() {
        let mut writer =
            GeoTiffWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian).unwrap();
        assert!(matches!(
            writer.write_metadata(),
            Err(crate::CodecError::Usage(UsageError::EmptyDirectory))
        ));
    }

    #[test]
    fn raster_size_must_match() {
        let mut writer =
            GeoTiffWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian).unwrap();
        let err = writer.write_raster(3, 2, &[0f32; 5]);
        assert!(matches!(
            err,
            Err(crate::CodecError::Usage(UsageError::DataSizeMismatch {
                expected: 6,
                found: 5
            }))
        ));
    }

    #[test]
    fn directories_are_chained() {
        let mut writer =
            GeoTiffWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian).unwrap();
        writer.write_raster(2, 1, &[1u8, 2]).unwrap();
        let first = writer.write_metadata().unwrap();
        writer.write_raster(1, 2, &[3u16, 4]).unwrap();
        let second = writer.write_metadata().unwrap();
        assert!(second > first);

        let mut cursor = writer.into_inner().unwrap();
        cursor.set_position(0);
        let mut reader = GeoTiffReader::new(cursor).unwrap();
        assert_eq!(reader.image_count(), 2);
        assert_eq!(reader.directory(0).unwrap().next(), Some(second));
        assert_eq!(reader.directory(1).unwrap().next(), None);
        assert_eq!(
            reader.read_array(1).unwrap().data,
            crate::decoder::RasterData::U16(vec![3, 4])
        );
    }
}
