use std::io::{self, Seek, SeekFrom, Write};

use crate::decoder::stream::ByteOrder;

macro_rules! write_fn {
    ($name:ident, $type:ty) => {
        #[inline]
        pub fn $name(&mut self, n: $type) -> Result<(), io::Error> {
            let bytes = match self.byte_order {
                ByteOrder::LittleEndian => n.to_le_bytes(),
                ByteOrder::BigEndian => n.to_be_bytes(),
            };
            self.write_bytes(&bytes)
        }
    };
}

/// Writer that encodes numbers in a fixed byte order.
pub struct TiffWriter<W> {
    writer: W,
    byte_order: ByteOrder,
}

impl<W: Write> TiffWriter<W> {
    pub fn new(writer: W, byte_order: ByteOrder) -> Self {
        Self { writer, byte_order }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), io::Error> {
        self.writer.write_all(bytes)
    }

    pub fn write_u8(&mut self, n: u8) -> Result<(), io::Error> {
        self.write_bytes(&[n])
    }

    write_fn!(write_u16, u16);
    write_fn!(write_u32, u32);
    write_fn!(write_f32, f32);
    write_fn!(write_f64, f64);

    pub fn flush(&mut self) -> Result<(), io::Error> {
        self.writer.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Seek> TiffWriter<W> {
    pub fn goto_offset(&mut self, offset: u64) -> Result<(), io::Error> {
        self.writer.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    pub fn offset(&mut self) -> Result<u64, io::Error> {
        self.writer.stream_position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_follow_byte_order() {
        let mut buf = Vec::new();
        {
            let mut writer = TiffWriter::new(&mut buf, ByteOrder::BigEndian);
            writer.write_u16(0x0102).unwrap();
            writer.write_u32(0x0304_0506).unwrap();
        }
        assert_eq!(buf, vec![1, 2, 3, 4, 5, 6]);

        let mut buf = Vec::new();
        TiffWriter::new(&mut buf, ByteOrder::LittleEndian)
            .write_u16(0x0102)
            .unwrap();
        assert_eq!(buf, vec![2, 1]);
    }
}
