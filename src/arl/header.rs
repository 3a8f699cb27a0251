use log::debug;

use super::fields::{int_field, real_field, text_field, FieldReader};
use super::label::GridId;
use crate::error::{CodecResult, FormatError, UsageError};

/// Length of the header at the start of every index record.
pub const HEADER_LEN: usize = 108;

/// The header stored once per time step, ahead of the level index.
#[derive(Clone, Debug, PartialEq)]
pub struct DataHead {
    /// Source model, four characters.
    pub model: String,
    pub forecast_hour: i32,
    pub minutes: i32,
    pub pole_lat: f64,
    pub pole_lon: f64,
    pub ref_lat: f64,
    pub ref_lon: f64,
    /// Grid spacing in kilometres; zero for latitude-longitude grids.
    pub grid_size: f64,
    pub orientation: f64,
    pub tangent_lat: f64,
    pub sync_x: f64,
    pub sync_y: f64,
    pub sync_lat: f64,
    pub sync_lon: f64,
    pub reserved: f64,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// Vertical coordinate system flag.
    pub vertical_flag: i32,
    /// Bytes of header plus level index.
    pub index_len: usize,
}

impl DataHead {
    /// Parse a header. The grid id of the record label supplies the
    /// thousands of the grid dimensions.
    pub fn parse(bytes: &[u8], grid: GridId) -> CodecResult<DataHead> {
        let mut fields = FieldReader::new(bytes);
        let model = fields.text(4)?;
        let forecast_hour = fields.int(3, "forecast hour")?;
        let minutes = fields.int(2, "minutes")?;
        let mut reals = [0f64; 12];
        for value in reals.iter_mut() {
            *value = fields.real(7, "grid definition")?;
        }
        let nx = fields.int(3, "nx")?;
        let ny = fields.int(3, "ny")?;
        let nz = fields.int(3, "nz")?;
        let vertical_flag = fields.int(2, "vertical flag")?;
        let index_len = fields.int(4, "index length")?;

        let (nx_thousands, ny_thousands) = grid.thousands();
        let [pole_lat, pole_lon, ref_lat, ref_lon, grid_size, orientation, tangent_lat, sync_x, sync_y, sync_lat, sync_lon, reserved] =
            reals;
        Ok(DataHead {
            model,
            forecast_hour,
            minutes,
            pole_lat,
            pole_lon,
            ref_lat,
            ref_lon,
            grid_size,
            orientation,
            tangent_lat,
            sync_x,
            sync_y,
            sync_lat,
            sync_lon,
            reserved,
            nx: nx_thousands * 1000 + dimension(nx)?,
            ny: ny_thousands * 1000 + dimension(ny)?,
            nz: dimension(nz)?,
            vertical_flag,
            index_len: dimension(index_len)?,
        })
    }

    /// The header as its 108 characters. Grid dimensions are written modulo
    /// 1000, the thousands go into the grid id of the label.
    pub fn format(&self) -> CodecResult<String> {
        let mut out = String::with_capacity(HEADER_LEN);
        text_field(&mut out, &self.model, 4);
        int_field(&mut out, i64::from(self.forecast_hour), 3, "forecast hour")?;
        int_field(&mut out, i64::from(self.minutes), 2, "minutes")?;
        for value in [
            self.pole_lat,
            self.pole_lon,
            self.ref_lat,
            self.ref_lon,
            self.grid_size,
            self.orientation,
            self.tangent_lat,
            self.sync_x,
            self.sync_y,
            self.sync_lat,
            self.sync_lon,
            self.reserved,
        ] {
            real_field(&mut out, value, 7, 2, "grid definition")?;
        }
        int_field(&mut out, (self.nx % 1000) as i64, 3, "nx")?;
        int_field(&mut out, (self.ny % 1000) as i64, 3, "ny")?;
        int_field(&mut out, self.nz as i64, 3, "nz")?;
        int_field(&mut out, i64::from(self.vertical_flag), 2, "vertical flag")?;
        int_field(&mut out, self.index_len as i64, 4, "index length")?;
        Ok(out)
    }

    pub fn grid_points(&self) -> usize {
        self.nx * self.ny
    }
}

fn dimension(value: i32) -> CodecResult<usize> {
    usize::try_from(value).map_err(|_| FormatError::InconsistentSizesEncountered.into())
}

/// A variable stored on a level, with the checksum of its last record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableEntry {
    pub name: String,
    pub checksum: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Level {
    pub height: f64,
    pub variables: Vec<VariableEntry>,
}

impl Level {
    pub fn new<S: AsRef<str>>(height: f64, names: &[S]) -> Self {
        Level {
            height,
            variables: names
                .iter()
                .map(|name| VariableEntry {
                    name: name.as_ref().to_owned(),
                    checksum: 0,
                })
                .collect(),
        }
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }
}

/// The levels of a time step and the variables stored on each, in record
/// order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelVarList {
    pub levels: Vec<Level>,
}

impl LevelVarList {
    pub fn new(levels: Vec<Level>) -> Self {
        LevelVarList { levels }
    }

    /// Parse the index of `nz` levels following the header.
    pub fn parse(bytes: &[u8], nz: usize) -> CodecResult<LevelVarList> {
        let mut fields = FieldReader::new(bytes);
        let mut levels = Vec::with_capacity(nz);
        for _ in 0..nz {
            let height = fields.real(6, "level height").map_err(truncated)?;
            let count = fields.int(2, "variable count").map_err(truncated)?;
            let count = usize::try_from(count).map_err(|_| FormatError::IndexTruncated)?;
            let mut variables = Vec::with_capacity(count);
            for _ in 0..count {
                let name = fields.text(4).map_err(truncated)?;
                let filler = fields.raw(4).map_err(truncated)?;
                variables.push(VariableEntry {
                    checksum: filler_checksum(&name, filler),
                    name,
                });
            }
            levels.push(Level { height, variables });
        }
        Ok(LevelVarList { levels })
    }

    pub fn format(&self) -> CodecResult<String> {
        let mut out = String::with_capacity(self.encoded_len());
        for level in &self.levels {
            real_field(&mut out, level.height, 6, 4, "level height")?;
            int_field(&mut out, level.variables.len() as i64, 2, "variable count")?;
            for variable in &level.variables {
                text_field(&mut out, &variable.name, 4);
                int_field(&mut out, i64::from(variable.checksum), 3, "checksum")?;
                out.push(' ');
            }
        }
        Ok(out)
    }

    pub fn encoded_len(&self) -> usize {
        self.levels
            .iter()
            .map(|level| 8 + 8 * level.variables.len())
            .sum()
    }

    pub fn level(&self, level: usize) -> CodecResult<&Level> {
        self.levels
            .get(level)
            .ok_or_else(|| UsageError::UnknownLevel(level).into())
    }

    /// Position of `variable` among the variables of `level`.
    pub fn variable_index(&self, level: usize, variable: &str) -> CodecResult<usize> {
        self.level(level)?.variable_index(variable).ok_or_else(|| {
            UsageError::UnknownVariable {
                level,
                variable: variable.to_owned(),
            }
            .into()
        })
    }

    pub fn variable_count(&self) -> usize {
        self.levels.iter().map(|level| level.variables.len()).sum()
    }
}

/// The checksum in the four filler bytes after a variable name. Producers
/// that leave other content there get a checksum of zero.
fn filler_checksum(name: &str, filler: &[u8]) -> u16 {
    let text = String::from_utf8_lossy(&filler[..3]);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    trimmed.parse().unwrap_or_else(|_| {
        debug!("variable {} has no checksum in filler {:?}", name, text);
        0
    })
}

// A field running past the end of the index means the index is short, not
// that the field is malformed.
fn truncated(err: crate::CodecError) -> crate::CodecError {
    match err {
        crate::CodecError::Format(FormatError::InconsistentSizesEncountered) => {
            FormatError::IndexTruncated.into()
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head() -> DataHead {
        DataHead {
            model: "GFSQ".into(),
            forecast_hour: 6,
            minutes: 0,
            pole_lat: 90.0,
            pole_lon: 0.0,
            ref_lat: 1.0,
            ref_lon: 1.0,
            grid_size: 0.0,
            orientation: 0.0,
            tangent_lat: 0.0,
            sync_x: 1.0,
            sync_y: 1.0,
            sync_lat: -90.0,
            sync_lon: -180.0,
            reserved: 0.0,
            nx: 1360,
            ny: 181,
            nz: 2,
            vertical_flag: 2,
            index_len: 164,
        }
    }

    #[test]
    fn header_is_fixed_width() {
        let text = head().format().unwrap();
        assert_eq!(text.len(), HEADER_LEN);
        assert_eq!(&text[..9], "GFSQ  6 0");
        assert_eq!(&text[93..], "360181  2 2 164");

        let grid = GridId::for_size(1360, 181, 99);
        assert_eq!(DataHead::parse(text.as_bytes(), grid).unwrap(), head());
    }

    #[test]
    fn small_dimensions_without_extension() {
        let mut small = head();
        small.nx = 360;
        let text = small.format().unwrap();
        let parsed = DataHead::parse(text.as_bytes(), GridId::Number(99)).unwrap();
        assert_eq!(parsed.nx, 360);
        assert_eq!(parsed.grid_points(), 360 * 181);
    }

    #[test]
    fn index_layout() {
        let list = LevelVarList::new(vec![
            Level::new(0.0, &["T02M", "PRSS"]),
            Level::new(1000.0, &["TEMP"]),
        ]);
        assert_eq!(list.encoded_len(), 8 + 16 + 8 + 8);
        let text = list.format().unwrap();
        assert_eq!(text, "0.0000 2T02M  0 PRSS  0 1000.0 1TEMP  0 ");
        assert_eq!(text.len(), list.encoded_len());

        let parsed = LevelVarList::parse(text.as_bytes(), 2).unwrap();
        assert_eq!(parsed, list);
        assert_eq!(parsed.variable_index(0, "PRSS").unwrap(), 1);
        assert_eq!(parsed.variable_count(), 3);
        assert!(matches!(
            parsed.variable_index(1, "PRSS"),
            Err(crate::CodecError::Usage(UsageError::UnknownVariable { level: 1, .. }))
        ));
        assert!(parsed.variable_index(2, "TEMP").is_err());
    }

    #[test]
    fn non_numeric_filler_reads_as_zero_checksum() {
        let text = "0.0000 2T02M  7 PRSSxxxx";
        let parsed = LevelVarList::parse(text.as_bytes(), 1).unwrap();
        let variables = &parsed.levels[0].variables;
        assert_eq!(variables[0].checksum, 7);
        assert_eq!(variables[1].name, "PRSS");
        assert_eq!(variables[1].checksum, 0);
    }

    #[test]
    fn short_index() {
        let text = LevelVarList::new(vec![Level::new(0.0, &["T02M", "PRSS"])])
            .format()
            .unwrap();
        let err = LevelVarList::parse(&text.as_bytes()[..12], 1).unwrap_err();
        assert!(matches!(
            err,
            crate::CodecError::Format(FormatError::IndexTruncated)
        ));
    }
}
