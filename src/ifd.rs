//! Abstractions over TIFF directory entries

use std::io;

use crate::decoder::stream::{ByteOrder, EndianReader, SmartReader};
use crate::encoder::writer::TiffWriter;
use crate::error::{CodecError, CodecResult, FormatError, UsageError};
use crate::tags::{Tag, Type};

/// The decoded payload of a directory entry.
///
/// Integer field types (including both halves of every RATIONAL) decode to
/// `Integers`, FLOAT and DOUBLE to `Doubles` and ASCII to `Ascii`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integers(Vec<i64>),
    Doubles(Vec<f64>),
    /// Every byte of the field maps to one `char` (Latin-1), so the string
    /// keeps the exact field length including any NUL terminators.
    Ascii(String),
}

/// One tag/value binding of an image file directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    tag: Tag,
    field_type: Type,
    count: u32,
    value: Value,
}

impl DirectoryEntry {
    /// Bind `value` to `tag` using the given field type.
    ///
    /// The payload must match the field type: integers within the range of
    /// the type (an even number of them for rationals), doubles for FLOAT and
    /// DOUBLE, Latin-1 text for ASCII.
    pub fn new(tag: Tag, field_type: Type, value: Value) -> CodecResult<DirectoryEntry> {
        let mismatch = || CodecError::Usage(UsageError::PayloadMismatch(field_type));
        let count = match (&value, field_type) {
            (Value::Integers(ints), ty) if ty.is_integer() => {
                if !ints.iter().all(|&v| int_fits(ty, v)) {
                    return Err(mismatch());
                }
                if ty.is_rational() {
                    if ints.len() % 2 != 0 {
                        return Err(mismatch());
                    }
                    ints.len() / 2
                } else {
                    ints.len()
                }
            }
            (Value::Doubles(doubles), Type::FLOAT | Type::DOUBLE) => doubles.len(),
            (Value::Ascii(text), Type::ASCII) => {
                if text.chars().any(|c| u32::from(c) > 0xff) {
                    return Err(UsageError::NonLatin1Text.into());
                }
                text.chars().count()
            }
            _ => return Err(mismatch()),
        };

        Ok(DirectoryEntry {
            tag,
            field_type,
            count: u32::try_from(count)?,
            value,
        })
    }

    /// A SHORT array entry.
    pub fn shorts(tag: Tag, values: &[u16]) -> DirectoryEntry {
        DirectoryEntry {
            tag,
            field_type: Type::SHORT,
            count: values.len() as u32,
            value: Value::Integers(values.iter().map(|&v| i64::from(v)).collect()),
        }
    }

    /// A LONG array entry.
    pub fn longs(tag: Tag, values: &[u32]) -> DirectoryEntry {
        DirectoryEntry {
            tag,
            field_type: Type::LONG,
            count: values.len() as u32,
            value: Value::Integers(values.iter().map(|&v| i64::from(v)).collect()),
        }
    }

    /// A DOUBLE array entry.
    pub fn doubles(tag: Tag, values: &[f64]) -> DirectoryEntry {
        DirectoryEntry {
            tag,
            field_type: Type::DOUBLE,
            count: values.len() as u32,
            value: Value::Doubles(values.to_vec()),
        }
    }

    /// A NUL terminated ASCII entry.
    pub fn ascii(tag: Tag, text: &str) -> CodecResult<DirectoryEntry> {
        let mut text = text.to_owned();
        text.push('\0');
        DirectoryEntry::new(tag, Type::ASCII, Value::Ascii(text))
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn field_type(&self) -> Type {
        self.field_type
    }

    /// The number of values as stored in the directory (rationals count once).
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self.value {
            Value::Integers(ref ints) => Some(ints),
            _ => None,
        }
    }

    pub fn as_doubles(&self) -> Option<&[f64]> {
        match self.value {
            Value::Doubles(ref doubles) => Some(doubles),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.value {
            Value::Ascii(ref text) => Some(text),
            _ => None,
        }
    }

    /// All values widened to `f64`; rationals are divided out.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self.value {
            Value::Integers(ref ints) if self.field_type.is_rational() => Some(
                ints.chunks_exact(2)
                    .map(|pair| pair[0] as f64 / pair[1] as f64)
                    .collect(),
            ),
            Value::Integers(ref ints) => Some(ints.iter().map(|&v| v as f64).collect()),
            Value::Doubles(ref doubles) => Some(doubles.clone()),
            Value::Ascii(_) => None,
        }
    }

    /// The values as unsigned integers, failing on text, floats or negatives.
    pub fn to_u64_vec(&self) -> CodecResult<Vec<u64>> {
        let invalid = || CodecError::Format(FormatError::InvalidTagValue(self.tag));
        let ints = self.as_ints().ok_or_else(invalid)?;
        ints.iter()
            .map(|&v| u64::try_from(v).map_err(|_| invalid()))
            .collect()
    }

    /// The first value as an unsigned integer.
    pub fn first_u64(&self) -> CodecResult<u64> {
        self.to_u64_vec()?
            .first()
            .copied()
            .ok_or(CodecError::Format(FormatError::InvalidTagValue(self.tag)))
    }

    /// Size of the encoded payload in bytes.
    pub fn encoded_len(&self) -> u64 {
        u64::from(self.count) * u64::from(self.field_type.byte_len())
    }

    /// Whether the payload fits into the 4-byte value slot of the directory.
    pub fn is_inline(&self) -> bool {
        self.encoded_len() <= 4
    }

    /// Decode exactly `count` values of `field_type` from `bytes`.
    pub fn decode(
        tag: Tag,
        field_type: Type,
        count: u32,
        bytes: &[u8],
        byte_order: ByteOrder,
    ) -> CodecResult<DirectoryEntry> {
        let needed = field_type
            .value_bytes(count)
            .ok_or(CodecError::LimitsExceeded)?;
        if (bytes.len() as u64) < needed {
            return Err(FormatError::InconsistentSizesEncountered.into());
        }

        let n = count as usize;
        let mut reader = SmartReader::wrap(io::Cursor::new(bytes), byte_order);
        let value = match field_type {
            Type::ASCII => Value::Ascii(bytes[..n].iter().map(|&b| char::from(b)).collect()),
            Type::FLOAT => Value::Doubles(
                (0..n)
                    .map(|_| reader.read_f32().map(f64::from))
                    .collect::<io::Result<_>>()?,
            ),
            Type::DOUBLE => {
                Value::Doubles((0..n).map(|_| reader.read_f64()).collect::<io::Result<_>>()?)
            }
            ty => {
                let values = if ty.is_rational() { 2 * n } else { n };
                let mut ints = Vec::with_capacity(values);
                for _ in 0..values {
                    ints.push(read_int(&mut reader, ty)?);
                }
                Value::Integers(ints)
            }
        };

        Ok(DirectoryEntry {
            tag,
            field_type,
            count,
            value,
        })
    }

    /// Encode the payload in `byte_order`, without padding.
    pub fn encode(&self, byte_order: ByteOrder) -> CodecResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.encoded_len() as usize);
        {
            let mut writer = TiffWriter::new(&mut bytes, byte_order);
            match self.value {
                Value::Integers(ref ints) => {
                    for &v in ints {
                        write_int(&mut writer, self.field_type, v)?;
                    }
                }
                Value::Doubles(ref doubles) => {
                    for &v in doubles {
                        match self.field_type {
                            Type::FLOAT => writer.write_f32(v as f32)?,
                            _ => writer.write_f64(v)?,
                        }
                    }
                }
                Value::Ascii(ref text) => {
                    let raw: Vec<u8> = text.chars().map(|c| c as u8).collect();
                    writer.write_bytes(&raw)?;
                }
            }
        }
        Ok(bytes)
    }
}

fn read_int<R: EndianReader>(reader: &mut R, ty: Type) -> io::Result<i64> {
    Ok(match ty {
        Type::SBYTE => i64::from(reader.read_i8()?),
        Type::SHORT => i64::from(reader.read_u16()?),
        Type::SSHORT => i64::from(reader.read_i16()?),
        Type::LONG | Type::RATIONAL => i64::from(reader.read_u32()?),
        Type::SLONG | Type::SRATIONAL => i64::from(reader.read_i32()?),
        _ => i64::from(reader.read_u8()?),
    })
}

fn write_int<W: io::Write>(writer: &mut TiffWriter<W>, ty: Type, v: i64) -> io::Result<()> {
    match ty {
        Type::SBYTE => writer.write_u8(v as i8 as u8),
        Type::SHORT => writer.write_u16(v as u16),
        Type::SSHORT => writer.write_u16(v as i16 as u16),
        Type::LONG | Type::RATIONAL => writer.write_u32(v as u32),
        Type::SLONG | Type::SRATIONAL => writer.write_u32(v as i32 as u32),
        _ => writer.write_u8(v as u8),
    }
}

fn int_fits(ty: Type, v: i64) -> bool {
    match ty {
        Type::SBYTE => i8::try_from(v).is_ok(),
        Type::SHORT => u16::try_from(v).is_ok(),
        Type::SSHORT => i16::try_from(v).is_ok(),
        Type::LONG | Type::RATIONAL => u32::try_from(v).is_ok(),
        Type::SLONG | Type::SRATIONAL => i32::try_from(v).is_ok(),
        _ => u8::try_from(v).is_ok(),
    }
}
