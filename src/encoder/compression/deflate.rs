use std::io::{self, Write};

use flate2::{write::ZlibEncoder, Compression as FlateCompression};

/// The level of compression used by the Deflate algorithm.
/// It allows trading compression ratio for compression speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[non_exhaustive]
pub enum DeflateLevel {
    /// The fastest possible compression mode.
    Fast = 1,
    /// The conserative choice between speed and ratio.
    #[default]
    Balanced = 6,
    /// The best compression available with Deflate.
    Best = 9,
}

pub(super) fn compress(bytes: &[u8], level: DeflateLevel) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), FlateCompression::new(level as u32));
    encoder.write_all(bytes)?;
    encoder.finish()
}
