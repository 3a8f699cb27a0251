//! Reading and writing of geospatial rasters
//!
//! Two binary raster containers are supported:
//!
//! * GeoTIFF, a TIFF file whose directories carry geo-referencing tags and a
//!   GeoKey directory. See [`GeoTiffReader`] and [`GeoTiffWriter`].
//! * ARL packed grids, the meteorological format read by dispersion models.
//!   See [`ArlReader`] and [`ArlWriter`].
//!
//! # Related Links
//! * <https://web.archive.org/web/20210108073850/https://www.adobe.io/open/standards/TIFF.html> - The TIFF specification
//! * <https://docs.ogc.org/is/19-008r4/19-008r4.html> - OGC GeoTIFF standard
//! * <https://www.ready.noaa.gov/hysplitusersguide/S141.htm> - ARL data format

#[macro_use]
pub mod tags;

pub mod arl;
pub mod decoder;
mod directory;
pub mod encoder;
mod error;
pub mod geo;
mod ifd;

pub use self::arl::{ArlReader, ArlWriter};
pub use self::decoder::stream::ByteOrder;
pub use self::decoder::{GeoTiffReader, Raster, RasterData};
pub use self::directory::Directory;
pub use self::encoder::GeoTiffWriter;
pub use self::error::{
    CodecError, CodecResult, FormatError, UnsupportedError, UsageError,
};
pub use self::ifd::{DirectoryEntry, Value};
