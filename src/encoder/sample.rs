use crate::decoder::stream::ByteOrder;
use crate::tags::SampleFormat;

/// Sample types that [`GeoTiffWriter::write_raster`](super::GeoTiffWriter::write_raster)
/// can store.
pub trait Sample: Copy {
    /// The value of the tiff tag `BitsPerSample`
    const BITS_PER_SAMPLE: u16;
    /// The value of the tiff tag `SampleFormat`
    const SAMPLE_FORMAT: SampleFormat;

    /// Append the encoded sample to `buf`.
    fn encode(self, byte_order: ByteOrder, buf: &mut Vec<u8>);
}

macro_rules! sample_impl {
    ($ty:ty, $bits:expr, $format:expr) => {
        impl Sample for $ty {
            const BITS_PER_SAMPLE: u16 = $bits;
            const SAMPLE_FORMAT: SampleFormat = $format;

            #[inline]
            fn encode(self, byte_order: ByteOrder, buf: &mut Vec<u8>) {
                match byte_order {
                    ByteOrder::LittleEndian => buf.extend_from_slice(&self.to_le_bytes()),
                    ByteOrder::BigEndian => buf.extend_from_slice(&self.to_be_bytes()),
                }
            }
        }
    };
}

sample_impl!(u8, 8, SampleFormat::Uint);
sample_impl!(i8, 8, SampleFormat::Int);
sample_impl!(u16, 16, SampleFormat::Uint);
sample_impl!(i16, 16, SampleFormat::Int);
sample_impl!(u32, 32, SampleFormat::Uint);
sample_impl!(i32, 32, SampleFormat::Int);
sample_impl!(f32, 32, SampleFormat::IEEEFP);
sample_impl!(f64, 64, SampleFormat::IEEEFP);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_follow_byte_order() {
        let mut buf = Vec::new();
        1.0f32.encode(ByteOrder::BigEndian, &mut buf);
        (-2i16).encode(ByteOrder::LittleEndian, &mut buf);
        assert_eq!(buf, vec![0x3f, 0x80, 0, 0, 0xfe, 0xff]);
        assert_eq!(<f64 as Sample>::BITS_PER_SAMPLE, 64);
        assert_eq!(<i8 as Sample>::SAMPLE_FORMAT, SampleFormat::Int);
    }
}
