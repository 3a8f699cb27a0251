//! ARL packed meteorological grids.
//!
//! An ARL file is a sequence of fixed length records, each a 50 character
//! text label followed by one byte per grid point. Every time step starts
//! with index records holding a text header and the list of levels and
//! their variables, followed by one record per variable and level. Values
//! are packed as byte deltas, see [`pack`].

mod fields;
mod header;
mod label;
mod layout;
mod packing;
mod reader;
mod writer;

pub use self::header::{DataHead, Level, LevelVarList, VariableEntry, HEADER_LEN};
pub use self::label::{DataLabel, GridId, INDEX_VARIABLE, LABEL_LEN};
pub use self::layout::GridLayout;
pub use self::packing::{checksum, pack, unpack, Packed};
pub use self::reader::{ArlGrid, ArlReader};
pub use self::writer::ArlWriter;
