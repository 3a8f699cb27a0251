//! Registry of GeoKey identifiers and of the enumerated values some of them
//! carry.
//!
//! More info about GeoTIFF keys can be found
//! [here](http://geotiff.maptools.org/spec/geotiff2.7.html).

tags! {
/// GeoKey identifiers
pub enum GeoKeyId(u16) unknown(
    /// A key outside the GeoTIFF 1.0 registry
    unknown
) {
    // GeoTIFF Configuration GeoKeys
    GTModelTypeGeoKey = 1024,
    GTRasterTypeGeoKey = 1025,
    GTCitationGeoKey = 1026,
    // Geographic CS Parameter GeoKeys
    GeographicTypeGeoKey = 2048,
    GeogCitationGeoKey = 2049,
    GeogGeodeticDatumGeoKey = 2050,
    GeogPrimeMeridianGeoKey = 2051,
    GeogLinearUnitsGeoKey = 2052,
    GeogLinearUnitSizeGeoKey = 2053,
    GeogAngularUnitsGeoKey = 2054,
    GeogAngularUnitSizeGeoKey = 2055,
    GeogEllipsoidGeoKey = 2056,
    GeogSemiMajorAxisGeoKey = 2057,
    GeogSemiMinorAxisGeoKey = 2058,
    GeogInvFlatteningGeoKey = 2059,
    GeogAzimuthUnitsGeoKey = 2060,
    GeogPrimeMeridianLongGeoKey = 2061,
    // Projected CS Parameter GeoKeys
    ProjectedCSTypeGeoKey = 3072,
    PCSCitationGeoKey = 3073,
    // Projection Definition GeoKeys
    ProjectionGeoKey = 3074,
    ProjCoordTransGeoKey = 3075,
    ProjLinearUnitsGeoKey = 3076,
    ProjLinearUnitSizeGeoKey = 3077,
    ProjStdParallel1GeoKey = 3078,
    ProjStdParallel2GeoKey = 3079,
    ProjNatOriginLongGeoKey = 3080,
    ProjNatOriginLatGeoKey = 3081,
    ProjFalseEastingGeoKey = 3082,
    ProjFalseNorthingGeoKey = 3083,
    ProjFalseOriginLongGeoKey = 3084,
    ProjFalseOriginLatGeoKey = 3085,
    ProjFalseOriginEastingGeoKey = 3086,
    ProjFalseOriginNorthingGeoKey = 3087,
    ProjCenterLongGeoKey = 3088,
    ProjCenterLatGeoKey = 3089,
    ProjCenterEastingGeoKey = 3090,
    ProjCenterNorthingGeoKey = 3091,
    ProjScaleAtNatOriginGeoKey = 3092,
    ProjScaleAtCenterGeoKey = 3093,
    ProjAzimuthAngleGeoKey = 3094,
    ProjStraightVertPoleLongGeoKey = 3095,
    // Vertical CS Parameter Keys
    VerticalCSTypeGeoKey = 4096,
    VerticalCitationGeoKey = 4097,
    VerticalDatumGeoKey = 4098,
    VerticalUnitsGeoKey = 4099,
}
}

tags! {
/// Values of `GTModelTypeGeoKey`
pub enum ModelType(u16) {
    Projected = 1,
    Geographic = 2,
    Geocentric = 3,
}
}

tags! {
/// Values of `GTRasterTypeGeoKey`
pub enum RasterType(u16) {
    PixelIsArea = 1,
    PixelIsPoint = 2,
}
}

tags! {
/// Values of `ProjCoordTransGeoKey`
pub enum CoordTransform(u16) unknown(
    /// A transformation code outside the registry
    unknown
) {
    TransverseMercator = 1,
    TransvMercatorModifiedAlaska = 2,
    ObliqueMercator = 3,
    ObliqueMercatorLaborde = 4,
    ObliqueMercatorRosenmund = 5,
    ObliqueMercatorSpherical = 6,
    Mercator = 7,
    LambertConfConic2SP = 8,
    LambertConfConicHelmert = 9,
    LambertAzimEqualArea = 10,
    AlbersEqualArea = 11,
    AzimuthalEquidistant = 12,
    EquidistantConic = 13,
    Stereographic = 14,
    PolarStereographic = 15,
    ObliqueStereographic = 16,
    Equirectangular = 17,
    CassiniSoldner = 18,
    Gnomonic = 19,
    MillerCylindrical = 20,
    Orthographic = 21,
    Polyconic = 22,
    Robinson = 23,
    Sinusoidal = 24,
    VanDerGrinten = 25,
    NewZealandMapGrid = 26,
    TransvMercatorSouthOriented = 27,
}
}

/// Code shared by all keys for "user-defined".
pub const USER_DEFINED: u16 = 32767;

const GEOGRAPHIC_TYPES: &[(u16, &str)] = &[
    (4267, "GCS_NAD27"),
    (4269, "GCS_NAD83"),
    (4322, "GCS_WGS_72"),
    (4326, "GCS_WGS_84"),
];

const GEODETIC_DATUMS: &[(u16, &str)] = &[
    (6267, "Datum_North_American_Datum_1927"),
    (6269, "Datum_North_American_Datum_1983"),
    (6322, "Datum_WGS72"),
    (6326, "Datum_WGS84"),
];

const ELLIPSOIDS: &[(u16, &str)] = &[
    (7008, "Ellipse_Clarke_1866"),
    (7019, "Ellipse_GRS_1980"),
    (7030, "Ellipse_WGS_84"),
];

const LINEAR_UNITS: &[(u16, &str)] = &[
    (9001, "Linear_Meter"),
    (9002, "Linear_Foot"),
    (9003, "Linear_Foot_US_Survey"),
];

const ANGULAR_UNITS: &[(u16, &str)] = &[
    (9101, "Angular_Radian"),
    (9102, "Angular_Degree"),
    (9103, "Angular_Arc_Minute"),
    (9104, "Angular_Arc_Second"),
];

fn lookup(table: &[(u16, &'static str)], value: u16) -> Option<&'static str> {
    table
        .iter()
        .find(|&&(code, _)| code == value)
        .map(|&(_, label)| label)
}

/// Human readable label of an enumerated GeoKey value.
///
/// Returns `None` for keys that do not hold an enumeration and for codes not
/// in the registry.
pub fn describe(key: GeoKeyId, value: u16) -> Option<&'static str> {
    let lookup_value: fn(u16) -> Option<&'static str> = match key {
        GeoKeyId::GTModelTypeGeoKey => |v| ModelType::from_u16(v).and_then(|m| m.name()),
        GeoKeyId::GTRasterTypeGeoKey => |v| RasterType::from_u16(v).and_then(|r| r.name()),
        GeoKeyId::ProjCoordTransGeoKey => |v| CoordTransform::from_u16(v).and_then(|c| c.name()),
        GeoKeyId::GeographicTypeGeoKey => |v| lookup(GEOGRAPHIC_TYPES, v),
        GeoKeyId::GeogGeodeticDatumGeoKey => |v| lookup(GEODETIC_DATUMS, v),
        GeoKeyId::GeogEllipsoidGeoKey => |v| lookup(ELLIPSOIDS, v),
        GeoKeyId::GeogLinearUnitsGeoKey
        | GeoKeyId::ProjLinearUnitsGeoKey
        | GeoKeyId::VerticalUnitsGeoKey => |v| lookup(LINEAR_UNITS, v),
        GeoKeyId::GeogAngularUnitsGeoKey | GeoKeyId::GeogAzimuthUnitsGeoKey => {
            |v| lookup(ANGULAR_UNITS, v)
        }
        // Coded keys whose code tables are not carried here.
        GeoKeyId::GeogPrimeMeridianGeoKey
        | GeoKeyId::ProjectedCSTypeGeoKey
        | GeoKeyId::ProjectionGeoKey
        | GeoKeyId::VerticalCSTypeGeoKey
        | GeoKeyId::VerticalDatumGeoKey => |_| None,
        _ => return None,
    };
    if value == USER_DEFINED {
        return Some("user-defined");
    }
    lookup_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_round_trip_their_id() {
        let key = GeoKeyId::from_u16_exhaustive(5000);
        assert_eq!(key, GeoKeyId::Unknown(5000));
        assert_eq!(key.to_u16(), 5000);
        assert_eq!(
            GeoKeyId::from_u16_exhaustive(3075),
            GeoKeyId::ProjCoordTransGeoKey
        );
    }

    #[test]
    fn describes_projection_transforms() {
        let trans = GeoKeyId::ProjCoordTransGeoKey;
        assert_eq!(describe(trans, 1), Some("TransverseMercator"));
        assert_eq!(describe(trans, 7), Some("Mercator"));
        assert_eq!(describe(trans, 8), Some("LambertConfConic2SP"));
        assert_eq!(describe(trans, 9), Some("LambertConfConicHelmert"));
        assert_eq!(describe(trans, 11), Some("AlbersEqualArea"));
        assert_eq!(describe(trans, 14), Some("Stereographic"));
        assert_eq!(describe(trans, 99), None);
    }

    #[test]
    fn describes_datums_and_units() {
        assert_eq!(describe(GeoKeyId::GeographicTypeGeoKey, 4326), Some("GCS_WGS_84"));
        assert_eq!(describe(GeoKeyId::ProjLinearUnitsGeoKey, 9001), Some("Linear_Meter"));
        assert_eq!(describe(GeoKeyId::GTModelTypeGeoKey, 2), Some("Geographic"));
        assert_eq!(describe(GeoKeyId::ProjectedCSTypeGeoKey, USER_DEFINED), Some("user-defined"));
        assert_eq!(describe(GeoKeyId::GTCitationGeoKey, 1), None);
    }

    #[test]
    fn user_defined_only_for_coded_keys() {
        assert_eq!(describe(GeoKeyId::GeogEllipsoidGeoKey, USER_DEFINED), Some("user-defined"));
        assert_eq!(describe(GeoKeyId::ProjectionGeoKey, 16033), None);
        assert_eq!(describe(GeoKeyId::GTCitationGeoKey, USER_DEFINED), None);
        assert_eq!(describe(GeoKeyId::ProjNatOriginLatGeoKey, USER_DEFINED), None);
        assert_eq!(describe(GeoKeyId::Unknown(5000), USER_DEFINED), None);
    }
}
