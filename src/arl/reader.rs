use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use chrono::NaiveDateTime;
use log::{debug, warn};

use super::header::{DataHead, LevelVarList, HEADER_LEN};
use super::label::{DataLabel, INDEX_VARIABLE, LABEL_LEN};
use super::layout::GridLayout;
use super::packing::unpack;
use crate::error::{CodecResult, FormatError, UsageError};

/// One unpacked record.
#[derive(Clone, Debug, PartialEq)]
pub struct ArlGrid {
    pub label: DataLabel,
    pub nx: usize,
    pub ny: usize,
    /// Row by row, southern row first.
    pub data: Vec<f32>,
}

impl ArlGrid {
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if col >= self.nx {
            return None;
        }
        self.data.get(row * self.nx + col).copied()
    }
}

/// Reader of ARL packed grid files.
///
/// The header and level index of the first time step define the layout of
/// the whole file. The time axis is found by stepping over whole time steps
/// and reading only their first label.
#[derive(Debug)]
pub struct ArlReader<R> {
    reader: R,
    head: DataHead,
    levels: LevelVarList,
    layout: GridLayout,
    times: Vec<DataLabel>,
}

impl ArlReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> CodecResult<Self> {
        let file = File::open(path)?;
        ArlReader::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> ArlReader<R> {
    pub fn new(mut reader: R) -> CodecResult<ArlReader<R>> {
        reader.seek(SeekFrom::Start(0))?;
        let (first, head, index) = read_index(&mut reader)?;
        let levels = LevelVarList::parse(&index[HEADER_LEN..], head.nz)?;
        let layout = GridLayout::new(head.nx, head.ny, &levels);
        if layout.index_len() != head.index_len {
            warn!(
                "header declares an index of {} bytes, its levels need {}",
                head.index_len,
                layout.index_len()
            );
        }
        debug!(
            "ARL grid {}x{} with {} levels, {} records of {} bytes per time step",
            head.nx,
            head.ny,
            levels.levels.len(),
            layout.records_per_time(),
            layout.record_len()
        );

        let mut arl = ArlReader {
            reader,
            head,
            levels,
            layout,
            times: vec![first],
        };
        arl.discover_times()?;
        Ok(arl)
    }

    fn discover_times(&mut self) -> CodecResult<()> {
        let mut buf = [0u8; LABEL_LEN];
        loop {
            let offset = self.layout.time_offset(self.times.len());
            self.reader.seek(SeekFrom::Start(offset))?;
            match self.reader.read_exact(&mut buf) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(err.into()),
            }
            match DataLabel::parse(&buf) {
                Ok(label) if label.is_index() => self.times.push(label),
                Ok(label) => {
                    warn!(
                        "expected an index record at offset {}, found `{}`",
                        offset, label.variable
                    );
                    break;
                }
                Err(err) => {
                    warn!("unreadable label at offset {}: {}", offset, err);
                    break;
                }
            }
        }
        debug!("found {} time steps", self.times.len());
        Ok(())
    }

    pub fn head(&self) -> &DataHead {
        &self.head
    }

    pub fn levels(&self) -> &LevelVarList {
        &self.levels
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn time_count(&self) -> usize {
        self.times.len()
    }

    /// Valid times of all time steps, `None` where the label date is invalid.
    pub fn times(&self) -> Vec<Option<NaiveDateTime>> {
        self.times.iter().map(DataLabel::timestamp).collect()
    }

    /// The first label of time step `time`.
    pub fn time_label(&self, time: usize) -> Option<&DataLabel> {
        self.times.get(time)
    }

    /// Read the label of the record of `variable` on `level`.
    pub fn read_label(&mut self, time: usize, level: usize, variable: &str) -> CodecResult<DataLabel> {
        let offset = self.offset(time, level, variable)?;
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; LABEL_LEN];
        self.reader.read_exact(&mut buf)?;
        DataLabel::parse(&buf)
    }

    /// Read and unpack the record of `variable` on `level`.
    pub fn read_grid(&mut self, time: usize, level: usize, variable: &str) -> CodecResult<ArlGrid> {
        let offset = self.offset(time, level, variable)?;
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut record = vec![0u8; self.layout.record_len()];
        self.reader.read_exact(&mut record)?;

        let label = DataLabel::parse(&record[..LABEL_LEN])?;
        if label.variable != variable {
            return Err(FormatError::UnexpectedLabel {
                expected: variable.to_owned(),
                found: label.variable,
            }
            .into());
        }
        let data = unpack(
            &record[LABEL_LEN..],
            self.layout.nx(),
            label.exponent,
            label.reference as f32,
        );
        Ok(ArlGrid {
            label,
            nx: self.layout.nx(),
            ny: self.layout.ny(),
            data,
        })
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn offset(&self, time: usize, level: usize, variable: &str) -> CodecResult<u64> {
        if time >= self.times.len() {
            return Err(UsageError::TimeIndexOutOfRange(time).into());
        }
        let index = self.levels.variable_index(level, variable)?;
        self.layout.record_offset(time, level, index)
    }
}

/// Read the index records at the reader's position: the label of the first,
/// the header, and the payload bytes of all of them concatenated up to the
/// declared index length.
fn read_index<R: Read>(reader: &mut R) -> CodecResult<(DataLabel, DataHead, Vec<u8>)> {
    let mut buf = [0u8; LABEL_LEN + HEADER_LEN];
    reader.read_exact(&mut buf)?;
    let label = DataLabel::parse(&buf[..LABEL_LEN])?;
    if !label.is_index() {
        return Err(FormatError::UnexpectedLabel {
            expected: INDEX_VARIABLE.to_owned(),
            found: label.variable,
        }
        .into());
    }
    let head = DataHead::parse(&buf[LABEL_LEN..], label.grid)?;
    let points = head.grid_points();
    if points < HEADER_LEN || head.index_len < HEADER_LEN {
        return Err(FormatError::InconsistentSizesEncountered.into());
    }

    let mut index = buf[LABEL_LEN..].to_vec();
    index.resize(points, 0);
    reader.read_exact(&mut index[HEADER_LEN..])?;
    let mut continuation = vec![0u8; LABEL_LEN + points];
    while index.len() < head.index_len {
        reader.read_exact(&mut continuation)?;
        let next = DataLabel::parse(&continuation[..LABEL_LEN])?;
        if !next.is_index() {
            return Err(FormatError::IndexTruncated.into());
        }
        index.extend_from_slice(&continuation[LABEL_LEN..]);
    }
    index.truncate(head.index_len);
    Ok((label, head, index))
}
