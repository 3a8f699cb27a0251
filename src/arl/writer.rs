use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use log::{debug, warn};

use super::header::{DataHead, LevelVarList, HEADER_LEN};
use super::label::{DataLabel, GridId, INDEX_VARIABLE};
use super::layout::GridLayout;
use super::packing::pack;
use crate::error::{CodecResult, UsageError};

/// Grid number written into labels of grids below 1000 points per axis.
const DEFAULT_GRID_NUMBER: i32 = 99;

struct TimeStep {
    index: usize,
    time: NaiveDateTime,
    forecast: i32,
    /// Records written so far, per level and variable.
    written: Vec<Vec<bool>>,
}

/// Writer of ARL packed grid files.
///
/// Time steps are written one after the other: [`begin_time`] writes the
/// index records, [`write_grid`] packs one variable of one level, and
/// [`end_time`] rewrites the index with the checksums of the packed records.
///
/// [`begin_time`]: ArlWriter::begin_time
/// [`write_grid`]: ArlWriter::write_grid
/// [`end_time`]: ArlWriter::end_time
pub struct ArlWriter<W: Write + Seek> {
    writer: W,
    head: DataHead,
    levels: LevelVarList,
    layout: GridLayout,
    grid: GridId,
    step: Option<TimeStep>,
    times_written: usize,
    /// End of the data written so far.
    end: u64,
}

impl ArlWriter<File> {
    pub fn create<P: AsRef<Path>>(path: P, head: DataHead, levels: LevelVarList) -> CodecResult<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        ArlWriter::new(file, head, levels)
    }

    /// Finish the open time step, flush the file to disk and cut it at the
    /// end of the written records.
    pub fn close(mut self) -> CodecResult<()> {
        self.end_time()?;
        self.writer.flush()?;
        self.writer.set_len(self.end)?;
        self.writer.sync_all()?;
        Ok(())
    }
}

impl<W: Write + Seek> ArlWriter<W> {
    /// Start a file on `writer`. The level count and index length of `head`
    /// are taken from `levels`, the checksums of `levels` are ignored.
    pub fn new(writer: W, mut head: DataHead, mut levels: LevelVarList) -> CodecResult<Self> {
        if head.grid_points() < HEADER_LEN {
            return Err(UsageError::DataSizeMismatch {
                expected: HEADER_LEN,
                found: head.grid_points(),
            }
            .into());
        }
        for variable in levels.levels.iter_mut().flat_map(|l| l.variables.iter_mut()) {
            variable.checksum = 0;
        }
        let layout = GridLayout::new(head.nx, head.ny, &levels);
        head.nz = levels.levels.len();
        head.index_len = layout.index_len();
        // Fails early on values that do not fit the header fields.
        head.format()?;
        levels.format()?;

        let grid = GridId::for_size(head.nx, head.ny, DEFAULT_GRID_NUMBER);
        debug!(
            "writing ARL grid {}x{}, {} index records per time step",
            head.nx,
            head.ny,
            layout.index_records()
        );
        Ok(ArlWriter {
            writer,
            head,
            levels,
            layout,
            grid,
            step: None,
            times_written: 0,
            end: 0,
        })
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn times_written(&self) -> usize {
        self.times_written
    }

    /// Start the next time step, ending the open one.
    pub fn begin_time(&mut self, time: NaiveDateTime, forecast: i32) -> CodecResult<()> {
        self.end_time()?;
        for variable in self.levels.levels.iter_mut().flat_map(|l| l.variables.iter_mut()) {
            variable.checksum = 0;
        }
        let step = TimeStep {
            index: self.times_written,
            time,
            forecast,
            written: self
                .levels
                .levels
                .iter()
                .map(|level| vec![false; level.variables.len()])
                .collect(),
        };
        self.write_index(&step)?;
        self.step = Some(step);
        Ok(())
    }

    /// Pack `values`, given row by row with the southern row first, as the
    /// record of `variable` on `level`.
    pub fn write_grid(&mut self, level: usize, variable: &str, values: &[f32]) -> CodecResult<()> {
        let step = self.step.as_ref().ok_or(UsageError::NoOpenTimeStep)?;
        let index = self.levels.variable_index(level, variable)?;
        let packed = pack(values, self.layout.nx(), self.layout.ny())?;

        let mut label = DataLabel::new(
            step.time,
            step.forecast,
            i32::try_from(level)?,
            self.grid,
            variable,
        );
        label.exponent = packed.exponent;
        label.precision = f64::from(packed.precision);
        label.reference = f64::from(packed.reference);

        let offset = self.layout.record_offset(step.index, level, index)?;
        self.write_record(offset, &label, &packed.bytes)?;

        self.levels.levels[level].variables[index].checksum = packed.checksum;
        if let Some(step) = self.step.as_mut() {
            step.written[level][index] = true;
        }
        Ok(())
    }

    /// Finish the open time step, if any. Records that were not written are
    /// filled with zeros.
    pub fn end_time(&mut self) -> CodecResult<()> {
        let step = match self.step.take() {
            Some(step) => step,
            None => return Ok(()),
        };
        let missing: Vec<(usize, String)> = self
            .levels
            .levels
            .iter()
            .enumerate()
            .flat_map(|(level, l)| {
                l.variables
                    .iter()
                    .zip(&step.written[level])
                    .filter(|(_, written)| !**written)
                    .map(move |(v, _)| (level, v.name.clone()))
            })
            .collect();
        if !missing.is_empty() {
            warn!(
                "time step {} is missing {} records, writing zeros",
                step.index,
                missing.len()
            );
            let zeros = vec![0f32; self.layout.grid_points()];
            self.step = Some(step);
            for (level, variable) in &missing {
                self.write_grid(*level, variable, &zeros)?;
            }
            let step = self.step.take().ok_or(UsageError::NoOpenTimeStep)?;
            return self.finish_step(step);
        }
        self.finish_step(step)
    }

    fn finish_step(&mut self, step: TimeStep) -> CodecResult<()> {
        // The index is rewritten now that it knows the checksums.
        self.write_index(&step)?;
        self.times_written += 1;
        debug!("finished time step {} ({})", step.index, step.time);
        Ok(())
    }

    /// Finish the open time step and return the underlying writer, without
    /// truncating it.
    pub fn into_inner(mut self) -> CodecResult<W> {
        self.end_time()?;
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_index(&mut self, step: &TimeStep) -> CodecResult<()> {
        let mut text = self.head.format()?;
        text.push_str(&self.levels.format()?);
        let mut bytes = latin1(&text)?;
        let points = self.layout.grid_points();
        bytes.resize(self.layout.index_records() * points, b' ');

        let label = DataLabel::new(step.time, step.forecast, 0, self.grid, INDEX_VARIABLE);
        let mut offset = self.layout.time_offset(step.index);
        for chunk in bytes.chunks(points) {
            self.write_record(offset, &label, chunk)?;
            offset += self.layout.record_len() as u64;
        }
        Ok(())
    }

    fn write_record(&mut self, offset: u64, label: &DataLabel, payload: &[u8]) -> CodecResult<()> {
        let label = latin1(&label.format()?)?;
        self.writer.seek(SeekFrom::Start(offset))?;
        self.writer.write_all(&label)?;
        self.writer.write_all(payload)?;
        self.end = self.end.max(offset + (label.len() + payload.len()) as u64);
        Ok(())
    }
}

fn latin1(text: &str) -> CodecResult<Vec<u8>> {
    text.chars()
        .map(|c| u8::try_from(c).map_err(|_| UsageError::NonLatin1Text.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::NaiveDate;

    use super::*;
    use crate::arl::header::Level;
    use crate::arl::ArlReader;

    fn head(nx: usize, ny: usize) -> DataHead {
        DataHead {
            model: "TEST".into(),
            forecast_hour: 0,
            minutes: 0,
            pole_lat: 90.0,
            pole_lon: 0.0,
            ref_lat: 40.0,
            ref_lon: -100.0,
            grid_size: 0.0,
            orientation: 0.0,
            tangent_lat: 0.0,
            sync_x: 1.0,
            sync_y: 1.0,
            sync_lat: 40.0,
            sync_lon: -100.0,
            reserved: 0.0,
            nx,
            ny,
            nz: 0,
            vertical_flag: 2,
            index_len: 0,
        }
    }

    fn time(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    fn levels() -> LevelVarList {
        LevelVarList::new(vec![
            Level::new(0.0, &["PRSS", "T02M"]),
            Level::new(1000.0, &["TEMP", "UWND", "VWND"]),
            Level::new(850.0, &["TEMP", "UWND", "VWND"]),
        ])
    }

    #[test]
    fn records_land_on_layout_offsets() {
        let mut writer = ArlWriter::new(Cursor::new(Vec::new()), head(12, 10), levels()).unwrap();
        // 108 + 24 + 2 * 32 = 196 bytes of index in records of 120 points.
        assert_eq!(writer.layout().index_records(), 2);

        writer.begin_time(time(0), 0).unwrap();
        let values: Vec<f32> = (0..120).map(|v| v as f32).collect();
        writer.write_grid(1, "UWND", &values).unwrap();
        writer.end_time().unwrap();
        let bytes = writer.into_inner().unwrap().into_inner();

        let record_len = 170;
        assert_eq!(bytes.len(), 10 * record_len);
        assert_eq!(&bytes[14..18], b"INDX");
        assert_eq!(&bytes[record_len + 14..record_len + 18], b"INDX");
        let uwnd = (2 + 2 + 1) * record_len;
        assert_eq!(&bytes[uwnd + 14..uwnd + 18], b"UWND");
    }

    #[test]
    fn index_carries_checksums() {
        let mut writer = ArlWriter::new(Cursor::new(Vec::new()), head(12, 10), levels()).unwrap();
        writer.begin_time(time(6), 6).unwrap();
        let values: Vec<f32> = (0..120).map(|v| (v % 12) as f32 * 0.5).collect();
        let expected = pack(&values, 12, 10).unwrap().checksum;
        writer.write_grid(0, "T02M", &values).unwrap();
        let cursor = writer.into_inner().unwrap();

        let reader = ArlReader::new(cursor).unwrap();
        let level = reader.levels().level(0).unwrap();
        assert_eq!(level.variables[1].checksum, expected);
        // Filled with zeros: one byte of 127.
        assert_eq!(level.variables[0].checksum, 127 * 120 % 255);
    }

    #[test]
    fn grids_need_an_open_time_step() {
        let mut writer = ArlWriter::new(Cursor::new(Vec::new()), head(12, 10), levels()).unwrap();
        let err = writer.write_grid(0, "PRSS", &[0.0; 120]).unwrap_err();
        assert!(matches!(
            err,
            crate::CodecError::Usage(UsageError::NoOpenTimeStep)
        ));

        writer.begin_time(time(0), 0).unwrap();
        assert!(writer.write_grid(0, "TEMP", &[0.0; 120]).is_err());
        assert!(writer.write_grid(0, "PRSS", &[0.0; 119]).is_err());
    }

    #[test]
    fn grid_must_hold_the_header() {
        assert!(ArlWriter::new(Cursor::new(Vec::new()), head(10, 10), levels()).is_err());
    }
}
