use super::header::{LevelVarList, HEADER_LEN};
use super::label::LABEL_LEN;
use crate::error::{CodecResult, UsageError};

/// Record geometry of an ARL file.
///
/// Every time step starts with its index records, followed by one record
/// per variable of each level, levels in index order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridLayout {
    nx: usize,
    ny: usize,
    index_len: usize,
    variables_per_level: Vec<usize>,
}

impl GridLayout {
    pub fn new(nx: usize, ny: usize, levels: &LevelVarList) -> Self {
        GridLayout {
            nx,
            ny,
            index_len: HEADER_LEN + levels.encoded_len(),
            variables_per_level: levels.levels.iter().map(|l| l.variables.len()).collect(),
        }
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn grid_points(&self) -> usize {
        self.nx * self.ny
    }

    /// Label plus one byte per grid point.
    pub fn record_len(&self) -> usize {
        self.grid_points() + LABEL_LEN
    }

    /// Bytes of header plus level index.
    pub fn index_len(&self) -> usize {
        self.index_len
    }

    /// Records needed to hold header and index.
    pub fn index_records(&self) -> usize {
        match self.grid_points() {
            0 => 0,
            points => (self.index_len + points - 1) / points,
        }
    }

    pub fn records_per_time(&self) -> usize {
        self.index_records() + self.variables_per_level.iter().sum::<usize>()
    }

    pub fn time_len(&self) -> u64 {
        (self.records_per_time() * self.record_len()) as u64
    }

    /// Offset of the first record of time step `time`.
    pub fn time_offset(&self, time: usize) -> u64 {
        time as u64 * self.time_len()
    }

    /// Offset of the record of variable `variable` (by position) on `level`.
    pub fn record_offset(&self, time: usize, level: usize, variable: usize) -> CodecResult<u64> {
        let nvars = self
            .variables_per_level
            .get(level)
            .copied()
            .ok_or(UsageError::UnknownLevel(level))?;
        if variable >= nvars {
            return Err(UsageError::UnknownVariable {
                level,
                variable: variable.to_string(),
            }
            .into());
        }
        let before: usize = self.variables_per_level[..level].iter().sum();
        let record = self.index_records() + before + variable;
        Ok(self.time_offset(time) + (record * self.record_len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arl::header::Level;

    fn layout() -> (LevelVarList, GridLayout) {
        let levels = LevelVarList::new(vec![
            Level::new(0.0, &["T", "U", "V"]),
            Level::new(850.0, &["T", "U"]),
        ]);
        let layout = GridLayout::new(10, 10, &levels);
        (levels, layout)
    }

    #[test]
    fn geometry() {
        let (_, layout) = layout();
        assert_eq!(layout.record_len(), 150);
        assert_eq!(layout.index_len(), 108 + 32 + 24);
        // 164 bytes of index need two records of 100 points.
        assert_eq!(layout.index_records(), 2);
        assert_eq!(layout.records_per_time(), 7);
        assert_eq!(layout.time_len(), 1050);
    }

    #[test]
    fn addresses_follow_index_order() {
        let (levels, layout) = layout();
        let variable = levels.variable_index(1, "U").unwrap();
        assert_eq!(variable, 1);
        let offset = layout.record_offset(1, 1, variable).unwrap();
        assert_eq!(offset, 1050 + (2 + 3 + 1) * 150);
        assert_eq!(layout.record_offset(0, 0, 0).unwrap(), 300);
    }

    #[test]
    fn single_index_record() {
        let (levels, _) = layout();
        let layout = GridLayout::new(20, 10, &levels);
        assert_eq!(layout.index_records(), 1);
        let (rec_len, per_time) = (250, 6);
        assert_eq!(layout.records_per_time(), per_time);
        assert_eq!(
            layout.record_offset(1, 1, 1).unwrap(),
            (per_time * rec_len + rec_len + 3 * rec_len + rec_len) as u64
        );
    }

    #[test]
    fn unknown_positions() {
        let (_, layout) = layout();
        assert!(layout.record_offset(0, 2, 0).is_err());
        assert!(layout.record_offset(0, 1, 2).is_err());
    }
}
