//! Geo-referencing of a raster: projection strings and model coordinates.

use crate::directory::Directory;
use crate::error::{CodecError, CodecResult, FormatError, UnsupportedError};
use crate::tags::Tag;

use super::geo_key::{find_key, GeoKey};
use super::keys::{CoordTransform, GeoKeyId, ModelType, RasterType};

fn key_f64(keys: &[GeoKey], ids: &[GeoKeyId], default: f64) -> f64 {
    ids.iter()
        .find_map(|&id| find_key(keys, id).and_then(GeoKey::as_f64))
        .unwrap_or(default)
}

fn key_short(keys: &[GeoKey], id: GeoKeyId) -> Option<u16> {
    find_key(keys, id).and_then(GeoKey::as_short)
}

/// Build a PROJ parameter string for a projected coordinate system.
///
/// Only Transverse Mercator and Albers Equal Area definitions given by
/// their parameters are recognised. Everything else, including geographic
/// rasters and rasters without GeoKeys, yields `None`, in which case callers
/// should treat the coordinates as WGS 84 longitude/latitude.
pub fn projection(keys: &[GeoKey]) -> Option<String> {
    if key_short(keys, GeoKeyId::GTModelTypeGeoKey) != Some(ModelType::Projected.to_u16()) {
        return None;
    }

    let trans = CoordTransform::from_u16_exhaustive(key_short(keys, GeoKeyId::ProjCoordTransGeoKey)?);
    let false_easting = key_f64(
        keys,
        &[GeoKeyId::ProjFalseEastingGeoKey, GeoKeyId::ProjFalseOriginEastingGeoKey],
        0.0,
    );
    let false_northing = key_f64(
        keys,
        &[GeoKeyId::ProjFalseNorthingGeoKey, GeoKeyId::ProjFalseOriginNorthingGeoKey],
        0.0,
    );

    let mut proj = match trans {
        CoordTransform::TransverseMercator => format!(
            "+proj=tmerc +lat_0={} +lon_0={} +k={} +x_0={} +y_0={}",
            key_f64(keys, &[GeoKeyId::ProjNatOriginLatGeoKey], 0.0),
            key_f64(keys, &[GeoKeyId::ProjNatOriginLongGeoKey], 0.0),
            key_f64(keys, &[GeoKeyId::ProjScaleAtNatOriginGeoKey], 1.0),
            false_easting,
            false_northing,
        ),
        CoordTransform::AlbersEqualArea => format!(
            "+proj=aea +lat_1={} +lat_2={} +lat_0={} +lon_0={} +x_0={} +y_0={}",
            key_f64(keys, &[GeoKeyId::ProjStdParallel1GeoKey], 0.0),
            key_f64(keys, &[GeoKeyId::ProjStdParallel2GeoKey], 0.0),
            key_f64(
                keys,
                &[
                    GeoKeyId::ProjNatOriginLatGeoKey,
                    GeoKeyId::ProjFalseOriginLatGeoKey,
                    GeoKeyId::ProjCenterLatGeoKey,
                ],
                0.0
            ),
            key_f64(
                keys,
                &[
                    GeoKeyId::ProjNatOriginLongGeoKey,
                    GeoKeyId::ProjFalseOriginLongGeoKey,
                    GeoKeyId::ProjCenterLongGeoKey,
                ],
                0.0
            ),
            false_easting,
            false_northing,
        ),
        _ => return None,
    };

    match key_short(keys, GeoKeyId::GeographicTypeGeoKey) {
        Some(4267) => proj.push_str(" +datum=NAD27"),
        Some(4269) => proj.push_str(" +datum=NAD83"),
        Some(4326) => proj.push_str(" +datum=WGS84"),
        _ => proj.push_str(" +ellps=WGS84"),
    }
    match key_short(keys, GeoKeyId::ProjLinearUnitsGeoKey) {
        Some(9002) => proj.push_str(" +units=ft"),
        Some(9003) => proj.push_str(" +units=us-ft"),
        _ => proj.push_str(" +units=m"),
    }
    proj.push_str(" +no_defs");
    Some(proj)
}

/// Mapping from raster space (column, row from the top) to model space.
#[derive(Clone, Debug, PartialEq)]
pub enum GeoTransform {
    /// One tie point `(i, j, k, x, y, z)` and the pixel size `(sx, sy, sz)`.
    TiePoint { tie: [f64; 6], scale: [f64; 3] },
    /// Row-major 4x4 affine matrix from `ModelTransformationTag`.
    Affine([f64; 16]),
}

impl GeoTransform {
    /// Read the transformation of an image.
    ///
    /// `ModelTransformationTag` takes precedence; otherwise both
    /// `ModelTiepointTag` and `ModelPixelScaleTag` are required. Only the
    /// first tie point is used.
    pub fn from_directory(dir: &Directory) -> CodecResult<Option<GeoTransform>> {
        if let Some(entry) = dir.get(Tag::ModelTransformationTag) {
            let values = entry
                .to_f64_vec()
                .filter(|v| v.len() == 16)
                .ok_or(CodecError::Format(FormatError::InvalidTagValue(
                    Tag::ModelTransformationTag,
                )))?;
            let mut matrix = [0.0; 16];
            matrix.copy_from_slice(&values);
            return Ok(Some(GeoTransform::Affine(matrix)));
        }

        let (Some(tie), Some(scale)) = (
            dir.get(Tag::ModelTiepointTag),
            dir.get(Tag::ModelPixelScaleTag),
        ) else {
            return Ok(None);
        };
        let tie = tie
            .to_f64_vec()
            .filter(|v| v.len() >= 6)
            .ok_or(CodecError::Format(FormatError::InvalidTagValue(Tag::ModelTiepointTag)))?;
        let scale = scale
            .to_f64_vec()
            .filter(|v| v.len() >= 2)
            .ok_or(CodecError::Format(FormatError::InvalidTagValue(
                Tag::ModelPixelScaleTag,
            )))?;

        let mut t = [0.0; 6];
        t.copy_from_slice(&tie[..6]);
        let mut s = [0.0; 3];
        s[..2].copy_from_slice(&scale[..2]);
        if let Some(&sz) = scale.get(2) {
            s[2] = sz;
        }
        Ok(Some(GeoTransform::TiePoint { tie: t, scale: s }))
    }

    /// A north-up transform whose top left corner is at `(x, y)`.
    pub fn north_up(x: f64, y: f64, pixel_width: f64, pixel_height: f64) -> GeoTransform {
        GeoTransform::TiePoint {
            tie: [0.0, 0.0, 0.0, x, y, 0.0],
            scale: [pixel_width, pixel_height, 0.0],
        }
    }

    /// Model coordinates of a raster position. `row` counts from the top of
    /// the image, as stored in the file.
    pub fn pixel_to_model(&self, col: f64, row: f64) -> (f64, f64) {
        match *self {
            GeoTransform::TiePoint { tie, scale } => (
                tie[3] + (col - tie[0]) * scale[0],
                tie[4] - (row - tie[1]) * scale[1],
            ),
            GeoTransform::Affine(m) => (
                m[0] * col + m[1] * row + m[3],
                m[4] * col + m[5] * row + m[7],
            ),
        }
    }

    fn is_rotated(&self) -> bool {
        match *self {
            GeoTransform::TiePoint { .. } => false,
            GeoTransform::Affine(m) => m[1] != 0.0 || m[4] != 0.0,
        }
    }

    fn pixel_offset(raster_type: RasterType) -> f64 {
        match raster_type {
            RasterType::PixelIsPoint => 0.0,
            RasterType::PixelIsArea => 0.5,
        }
    }

    /// X coordinate of every column, west to east for a north-up raster.
    ///
    /// With `PixelIsArea` the coordinates are cell centres. Each value is
    /// computed from the transform directly, so there is no drift along the
    /// axis.
    pub fn x_coordinates(&self, width: usize, raster_type: RasterType) -> CodecResult<Vec<f64>> {
        if self.is_rotated() {
            return Err(UnsupportedError::RotatedTransform.into());
        }
        let offset = Self::pixel_offset(raster_type);
        Ok((0..width)
            .map(|i| self.pixel_to_model(i as f64 + offset, 0.0).0)
            .collect())
    }

    /// Y coordinate of every row of a decoded raster, whose row 0 is the last
    /// row of the file.
    pub fn y_coordinates(&self, height: usize, raster_type: RasterType) -> CodecResult<Vec<f64>> {
        if self.is_rotated() {
            return Err(UnsupportedError::RotatedTransform.into());
        }
        let offset = Self::pixel_offset(raster_type);
        Ok((0..height)
            .map(|j| {
                let file_row = (height - 1 - j) as f64;
                self.pixel_to_model(0.0, file_row + offset).1
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::geo_key::GeoKey;
    use crate::ifd::DirectoryEntry;

    fn utm33() -> Vec<GeoKey> {
        vec![
            GeoKey::short(GeoKeyId::GTModelTypeGeoKey, 1),
            GeoKey::short(GeoKeyId::GTRasterTypeGeoKey, 1),
            GeoKey::short(GeoKeyId::GeographicTypeGeoKey, 4326),
            GeoKey::short(GeoKeyId::ProjCoordTransGeoKey, 1),
            GeoKey::short(GeoKeyId::ProjLinearUnitsGeoKey, 9001),
            GeoKey::doubles(GeoKeyId::ProjNatOriginLatGeoKey, &[0.0]),
            GeoKey::doubles(GeoKeyId::ProjNatOriginLongGeoKey, &[15.0]),
            GeoKey::doubles(GeoKeyId::ProjScaleAtNatOriginGeoKey, &[0.9996]),
            GeoKey::doubles(GeoKeyId::ProjFalseEastingGeoKey, &[500000.0]),
            GeoKey::doubles(GeoKeyId::ProjFalseNorthingGeoKey, &[0.0]),
        ]
    }

    #[test]
    fn transverse_mercator_projection() {
        assert_eq!(
            projection(&utm33()).unwrap(),
            "+proj=tmerc +lat_0=0 +lon_0=15 +k=0.9996 +x_0=500000 +y_0=0 +datum=WGS84 +units=m +no_defs"
        );
    }

    #[test]
    fn albers_projection() {
        let keys = vec![
            GeoKey::short(GeoKeyId::GTModelTypeGeoKey, 1),
            GeoKey::short(GeoKeyId::ProjCoordTransGeoKey, 11),
            GeoKey::short(GeoKeyId::GeographicTypeGeoKey, 4269),
            GeoKey::doubles(GeoKeyId::ProjStdParallel1GeoKey, &[29.5]),
            GeoKey::doubles(GeoKeyId::ProjStdParallel2GeoKey, &[45.5]),
            GeoKey::doubles(GeoKeyId::ProjFalseOriginLatGeoKey, &[23.0]),
            GeoKey::doubles(GeoKeyId::ProjFalseOriginLongGeoKey, &[-96.0]),
        ];
        assert_eq!(
            projection(&keys).unwrap(),
            "+proj=aea +lat_1=29.5 +lat_2=45.5 +lat_0=23 +lon_0=-96 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs"
        );
    }

    #[test]
    fn other_models_have_no_projection() {
        assert_eq!(projection(&[]), None);
        assert_eq!(
            projection(&[GeoKey::short(GeoKeyId::GTModelTypeGeoKey, 2)]),
            None
        );
        assert_eq!(
            projection(&[
                GeoKey::short(GeoKeyId::GTModelTypeGeoKey, 1),
                GeoKey::short(GeoKeyId::ProjCoordTransGeoKey, 7),
            ]),
            None
        );
    }

    #[test]
    fn tie_point_axes() {
        let mut dir = Directory::empty();
        dir.insert(DirectoryEntry::doubles(
            Tag::ModelTiepointTag,
            &[0.0, 0.0, 0.0, 100.0, 50.0, 0.0],
        ));
        dir.insert(DirectoryEntry::doubles(Tag::ModelPixelScaleTag, &[10.0, 5.0, 0.0]));
        let transform = GeoTransform::from_directory(&dir).unwrap().unwrap();

        assert_eq!(
            transform.x_coordinates(3, RasterType::PixelIsArea).unwrap(),
            vec![105.0, 115.0, 125.0]
        );
        assert_eq!(
            transform.y_coordinates(2, RasterType::PixelIsArea).unwrap(),
            vec![42.5, 47.5]
        );
        assert_eq!(
            transform.x_coordinates(2, RasterType::PixelIsPoint).unwrap(),
            vec![100.0, 110.0]
        );
    }

    #[test]
    fn affine_transform_takes_precedence() {
        let mut dir = Directory::empty();
        dir.insert(DirectoryEntry::doubles(
            Tag::ModelTransformationTag,
            &[
                2.0, 0.0, 0.0, 10.0, //
                0.0, -2.0, 0.0, 20.0, //
                0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        ));
        dir.insert(DirectoryEntry::doubles(Tag::ModelPixelScaleTag, &[1.0, 1.0, 0.0]));
        dir.insert(DirectoryEntry::doubles(Tag::ModelTiepointTag, &[0.0; 6]));
        let transform = GeoTransform::from_directory(&dir).unwrap().unwrap();
        assert!(matches!(transform, GeoTransform::Affine(_)));
        assert_eq!(transform.pixel_to_model(1.0, 1.0), (12.0, 18.0));
        assert_eq!(
            transform.y_coordinates(2, RasterType::PixelIsPoint).unwrap(),
            vec![18.0, 20.0]
        );
    }

    #[test]
    fn rotated_transform_has_no_axes() {
        let mut m = [0.0; 16];
        m[0] = 1.0;
        m[1] = 0.5;
        m[5] = -1.0;
        m[15] = 1.0;
        let transform = GeoTransform::Affine(m);
        assert!(matches!(
            transform.x_coordinates(2, RasterType::PixelIsArea),
            Err(CodecError::Unsupported(UnsupportedError::RotatedTransform))
        ));
    }

    #[test]
    fn missing_tags_mean_no_transform() {
        let mut dir = Directory::empty();
        dir.insert(DirectoryEntry::doubles(Tag::ModelPixelScaleTag, &[1.0, 1.0, 0.0]));
        assert_eq!(GeoTransform::from_directory(&dir).unwrap(), None);
    }
}
