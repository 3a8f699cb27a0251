use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use super::fields::{exp_field, int_field, text_field, FieldReader};
use crate::error::CodecResult;

/// Length of the text label in front of every record.
pub const LABEL_LEN: usize = 50;

/// Variable name of the records holding the header and level index.
pub const INDEX_VARIABLE: &str = "INDX";

/// Grid identifier of a label.
///
/// Grids with 1000 or more points along an axis store the thousands of both
/// dimensions as letters instead of a grid number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridId {
    Number(i32),
    Extended { nx_thousands: u8, ny_thousands: u8 },
}

impl GridId {
    /// The grid id a grid of `nx * ny` points is labelled with.
    pub fn for_size(nx: usize, ny: usize, number: i32) -> GridId {
        if nx >= 1000 || ny >= 1000 {
            GridId::Extended {
                nx_thousands: (nx / 1000) as u8,
                ny_thousands: (ny / 1000) as u8,
            }
        } else {
            GridId::Number(number)
        }
    }

    /// Thousands to add to the three digit dimensions of the header.
    pub fn thousands(self) -> (usize, usize) {
        match self {
            GridId::Number(_) => (0, 0),
            GridId::Extended {
                nx_thousands,
                ny_thousands,
            } => (usize::from(nx_thousands), usize::from(ny_thousands)),
        }
    }

    fn parse(fields: &mut FieldReader) -> CodecResult<GridId> {
        let raw = fields.raw(2)?;
        if raw.iter().all(|&c| c >= 64) {
            return Ok(GridId::Extended {
                nx_thousands: raw[0] - 64,
                ny_thousands: raw[1] - 64,
            });
        }
        FieldReader::new(raw).int(2, "grid").map(GridId::Number)
    }

    fn format(self, out: &mut String) -> CodecResult<()> {
        match self {
            GridId::Number(n) => int_field(out, i64::from(n), 2, "grid"),
            GridId::Extended {
                nx_thousands,
                ny_thousands,
            } => {
                out.push(char::from(64 + nx_thousands));
                out.push(char::from(64 + ny_thousands));
                Ok(())
            }
        }
    }
}

/// The label preceding every ARL record.
#[derive(Clone, Debug, PartialEq)]
pub struct DataLabel {
    /// Year of the century, as stored.
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    pub forecast: i32,
    pub level: i32,
    pub grid: GridId,
    pub variable: String,
    pub exponent: i32,
    pub precision: f64,
    /// Unpacked value of the first cell.
    pub reference: f64,
}

impl DataLabel {
    pub fn new(time: NaiveDateTime, forecast: i32, level: i32, grid: GridId, variable: &str) -> Self {
        DataLabel {
            year: time.year() % 100,
            month: time.month() as i32,
            day: time.day() as i32,
            hour: time.hour() as i32,
            forecast,
            level,
            grid,
            variable: variable.to_owned(),
            exponent: 0,
            precision: 0.0,
            reference: 0.0,
        }
    }

    pub fn parse(bytes: &[u8]) -> CodecResult<DataLabel> {
        let mut fields = FieldReader::new(bytes);
        Ok(DataLabel {
            year: fields.int(2, "year")?,
            month: fields.int(2, "month")?,
            day: fields.int(2, "day")?,
            hour: fields.int(2, "hour")?,
            forecast: fields.int(2, "forecast")?,
            level: fields.int(2, "level")?,
            grid: GridId::parse(&mut fields)?,
            variable: fields.text(4)?,
            exponent: fields.int(4, "exponent")?,
            precision: fields.real(14, "precision")?,
            reference: fields.real(14, "reference")?,
        })
    }

    /// The label as its 50 characters.
    pub fn format(&self) -> CodecResult<String> {
        let mut out = String::with_capacity(LABEL_LEN);
        int_field(&mut out, i64::from(self.year), 2, "year")?;
        int_field(&mut out, i64::from(self.month), 2, "month")?;
        int_field(&mut out, i64::from(self.day), 2, "day")?;
        int_field(&mut out, i64::from(self.hour), 2, "hour")?;
        int_field(&mut out, i64::from(self.forecast), 2, "forecast")?;
        int_field(&mut out, i64::from(self.level), 2, "level")?;
        self.grid.format(&mut out)?;
        text_field(&mut out, &self.variable, 4);
        int_field(&mut out, i64::from(self.exponent), 4, "exponent")?;
        exp_field(&mut out, self.precision);
        exp_field(&mut out, self.reference);
        Ok(out)
    }

    /// Valid time of the record. Two digit years below 40 are in the 2000s.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let year = if self.year < 40 {
            2000 + self.year
        } else {
            1900 + self.year
        };
        NaiveDate::from_ymd_opt(year, self.month as u32, self.day as u32)?
            .and_hms_opt(self.hour as u32, 0, 0)
    }

    pub fn is_index(&self) -> bool {
        self.variable == INDEX_VARIABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABEL: &[u8] = b"24 7 112 0 199TEMP   2 0.1574803E-01 0.2831500E+03";

    #[test]
    fn parses_a_label() {
        let label = DataLabel::parse(LABEL).unwrap();
        assert_eq!(label.year, 24);
        assert_eq!(label.month, 7);
        assert_eq!(label.day, 1);
        assert_eq!(label.hour, 12);
        assert_eq!(label.forecast, 0);
        assert_eq!(label.level, 1);
        assert_eq!(label.grid, GridId::Number(99));
        assert_eq!(label.variable, "TEMP");
        assert_eq!(label.exponent, 2);
        assert!((label.reference - 283.15).abs() < 1e-9);
        assert_eq!(
            label.timestamp(),
            NaiveDate::from_ymd_opt(2024, 7, 1).and_then(|d| d.and_hms_opt(12, 0, 0))
        );
    }

    #[test]
    fn formats_what_it_parses() {
        let label = DataLabel::parse(LABEL).unwrap();
        let text = label.format().unwrap();
        assert_eq!(text.len(), LABEL_LEN);
        assert_eq!(text.as_bytes(), LABEL);
    }

    #[test]
    fn extended_grid_ids() {
        let grid = GridId::for_size(1200, 800, 99);
        assert_eq!(
            grid,
            GridId::Extended {
                nx_thousands: 1,
                ny_thousands: 0
            }
        );
        assert_eq!(grid.thousands(), (1, 0));
        assert_eq!(GridId::for_size(999, 999, 7), GridId::Number(7));

        let time = NaiveDate::from_ymd_opt(1995, 1, 31)
            .and_then(|d| d.and_hms_opt(6, 0, 0))
            .unwrap();
        let label = DataLabel::new(time, 3, 0, grid, "INDX");
        let text = label.format().unwrap();
        assert_eq!(&text[..18], "95 131 6 3 0A@INDX");

        let parsed = DataLabel::parse(text.as_bytes()).unwrap();
        assert_eq!(parsed.grid, grid);
        assert!(parsed.is_index());
        assert_eq!(parsed.timestamp(), Some(time));
    }

    #[test]
    fn year_pivot() {
        let mut label = DataLabel::parse(LABEL).unwrap();
        label.year = 39;
        assert_eq!(label.timestamp().map(|t| t.year()), Some(2039));
        label.year = 40;
        assert_eq!(label.timestamp().map(|t| t.year()), Some(1940));
        label.month = 13;
        assert_eq!(label.timestamp(), None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(DataLabel::parse(b"2x 7 112 0 199TEMP   2 0.1574803E-01 0.2831500E+03").is_err());
        assert!(DataLabel::parse(b"24 7 1").is_err());
    }
}
