//! Fixed-width text fields of ARL labels and headers.

use crate::error::{CodecResult, FormatError, UsageError};

/// Cursor over the fixed-width fields of a text record.
pub(crate) struct FieldReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        FieldReader { bytes, pos: 0 }
    }

    /// The next `width` bytes, unparsed.
    pub fn raw(&mut self, width: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos + width;
        let field = self
            .bytes
            .get(self.pos..end)
            .ok_or(FormatError::InconsistentSizesEncountered)?;
        self.pos = end;
        Ok(field)
    }

    /// A text field, trailing blanks removed.
    pub fn text(&mut self, width: usize) -> CodecResult<String> {
        let field = self.raw(width)?;
        let text: String = field.iter().map(|&b| char::from(b)).collect();
        Ok(text.trim_end().to_owned())
    }

    /// An integer field. A blank field reads as zero.
    pub fn int(&mut self, width: usize, name: &'static str) -> CodecResult<i32> {
        let field = self.raw(width)?;
        let text = String::from_utf8_lossy(field);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        trimmed.parse().map_err(|_| invalid(name, &text))
    }

    /// A real field in fixed (`F`) or exponent (`E`) notation. A blank field
    /// reads as zero.
    pub fn real(&mut self, width: usize, name: &'static str) -> CodecResult<f64> {
        let field = self.raw(width)?;
        let text = String::from_utf8_lossy(field);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(0.0);
        }
        parse_real(trimmed).ok_or_else(|| invalid(name, &text))
    }
}

fn invalid(field: &'static str, content: &str) -> crate::error::CodecError {
    FormatError::FixedWidthField {
        field,
        content: content.to_owned(),
    }
    .into()
}

fn parse_real(text: &str) -> Option<f64> {
    if let Ok(value) = text.parse() {
        return Some(value);
    }
    // Three digit exponents are written without the `E`: `0.1234567+100`.
    let split = text.rfind(|c| c == '+' || c == '-').filter(|&i| i > 0)?;
    format!("{}E{}", &text[..split], &text[split..]).parse().ok()
}

fn too_wide(field: &'static str, value: String) -> crate::error::CodecError {
    UsageError::FieldTooWide { field, value }.into()
}

/// Append a right aligned integer field.
pub(crate) fn int_field(out: &mut String, value: i64, width: usize, field: &'static str) -> CodecResult<()> {
    let text = format!("{:>width$}", value, width = width);
    if text.len() > width {
        return Err(too_wide(field, text));
    }
    out.push_str(&text);
    Ok(())
}

/// Append a fixed point real field with up to `decimals` decimals, dropping
/// decimals as needed to fit the value into `width`.
pub(crate) fn real_field(
    out: &mut String,
    value: f64,
    width: usize,
    decimals: usize,
    field: &'static str,
) -> CodecResult<()> {
    for precision in (0..=decimals).rev() {
        let text = format!("{:>width$.precision$}", value, width = width, precision = precision);
        if text.len() <= width {
            out.push_str(&text);
            return Ok(());
        }
    }
    Err(too_wide(field, value.to_string()))
}

/// Append a 14 character exponent field with 7 significant digits, the way
/// Fortran writes `E14.7`: ` 0.1234567E+01`.
pub(crate) fn exp_field(out: &mut String, value: f64) {
    out.push(if value < 0.0 { '-' } else { ' ' });
    if value == 0.0 || !value.is_finite() {
        out.push_str("0.0000000E+00");
        return;
    }
    // `{:e}` puts one digit before the point; move it behind.
    let text = format!("{:.6e}", value.abs());
    let (mantissa, exponent) = text.split_once('e').unwrap_or((text.as_str(), "0"));
    let exponent = exponent.parse::<i32>().unwrap_or(0) + 1;
    out.push_str("0.");
    out.extend(mantissa.chars().filter(char::is_ascii_digit));
    if exponent.abs() < 100 {
        out.push_str(&format!("E{:+03}", exponent));
    } else {
        out.push_str(&format!("{:+04}", exponent));
    }
}

/// Append a left aligned text field, cut or blank padded to `width`.
pub(crate) fn text_field(out: &mut String, text: &str, width: usize) {
    let mut chars = text.chars();
    for _ in 0..width {
        out.push(chars.next().unwrap_or(' '));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(value: f64) -> String {
        let mut out = String::new();
        exp_field(&mut out, value);
        out
    }

    #[test]
    fn exponent_fields() {
        assert_eq!(exp(1.0), " 0.1000000E+01");
        assert_eq!(exp(-273.15), "-0.2731500E+03");
        assert_eq!(exp(0.0), " 0.0000000E+00");
        assert_eq!(exp(0.015748031), " 0.1574803E-01");
        assert_eq!(exp(9.99999999), " 0.1000000E+02");
        assert_eq!(exp(1.0e120), " 0.1000000+121");
        for value in [1.0, -273.15, 0.015748031, 1.0e120] {
            assert_eq!(exp(value).len(), 14);
        }
    }

    #[test]
    fn reads_fields_in_sequence() {
        let mut reader = FieldReader::new(b"2407 1TEMP  -3 0.1574803E-01  1.50 0.1000000+121");
        assert_eq!(reader.int(2, "year").unwrap(), 24);
        assert_eq!(reader.int(2, "month").unwrap(), 7);
        assert_eq!(reader.int(2, "day").unwrap(), 1);
        assert_eq!(reader.text(4).unwrap(), "TEMP");
        assert_eq!(reader.int(4, "exponent").unwrap(), -3);
        assert!((reader.real(14, "precision").unwrap() - 0.01574803).abs() < 1e-12);
        assert_eq!(reader.real(6, "height").unwrap(), 1.5);
        assert_eq!(reader.real(14, "value").unwrap(), 1.0e120);
        assert!(reader.raw(1).is_err());
    }

    #[test]
    fn non_numeric_fields_are_format_errors() {
        let mut reader = FieldReader::new(b"x1");
        assert!(matches!(
            reader.int(2, "year"),
            Err(crate::CodecError::Format(FormatError::FixedWidthField { field: "year", .. }))
        ));
        assert_eq!(FieldReader::new(b"   ").int(3, "blank").unwrap(), 0);
    }

    #[test]
    fn writes_fixed_fields() {
        let mut out = String::new();
        int_field(&mut out, 7, 2, "month").unwrap();
        real_field(&mut out, 45.5, 7, 2, "lat").unwrap();
        real_field(&mut out, 12000.0, 7, 2, "size").unwrap();
        text_field(&mut out, "T2", 4);
        assert_eq!(out, " 7  45.5012000.0T2  ");

        assert!(int_field(&mut out, 100, 2, "level").is_err());
        assert!(real_field(&mut out, 1.0e9, 7, 2, "size").is_err());
    }
}
