//! GeoTIFF extensions: GeoKeys and geo-referencing of images.

mod geo_key;
pub mod keys;
mod referencing;

pub use self::geo_key::{encode_geo_keys, find_key, parse_geo_keys, GeoKey, GeoKeyValue};
pub use self::keys::{describe, CoordTransform, GeoKeyId, ModelType, RasterType};
pub use self::referencing::{projection, GeoTransform};
