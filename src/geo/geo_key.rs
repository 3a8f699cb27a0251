//! Expansion and construction of the GeoKey directory.
//!
//! A GeoKey directory is a SHORT array of the form
//! `[version, revision, minor, count, (id, location, count, offset) * count]`.
//! Keys with `location == 0` hold their value inline in `offset`; every other
//! key points into the array of the tag named by `location`.

use log::warn;

use crate::directory::Directory;
use crate::error::{CodecResult, FormatError};
use crate::ifd::{DirectoryEntry, Value};
use crate::tags::Tag;

use super::keys::GeoKeyId;

const KEY_DIRECTORY_VERSION: u16 = 1;
const KEY_REVISION: u16 = 1;
const MINOR_REVISION: u16 = 0;

/// Terminates each string stored in `GeoAsciiParamsTag`.
const ASCII_SEPARATOR: char = '|';

/// The value of a GeoKey.
#[derive(Clone, Debug, PartialEq)]
pub enum GeoKeyValue {
    /// A single SHORT stored inline in the key directory.
    Short(u16),
    /// SHORT values stored after the key entries of the directory.
    Shorts(Vec<u16>),
    Doubles(Vec<f64>),
    Ascii(String),
}

/// One GeoKey with its resolved value.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoKey {
    pub id: GeoKeyId,
    pub value: GeoKeyValue,
}

impl GeoKey {
    pub fn new(id: GeoKeyId, value: GeoKeyValue) -> GeoKey {
        GeoKey { id, value }
    }

    pub fn short(id: GeoKeyId, value: u16) -> GeoKey {
        GeoKey::new(id, GeoKeyValue::Short(value))
    }

    pub fn doubles(id: GeoKeyId, values: &[f64]) -> GeoKey {
        GeoKey::new(id, GeoKeyValue::Doubles(values.to_vec()))
    }

    pub fn ascii(id: GeoKeyId, text: &str) -> GeoKey {
        GeoKey::new(id, GeoKeyValue::Ascii(text.to_owned()))
    }

    /// Number of values, as recorded in the key directory.
    pub fn count(&self) -> usize {
        match self.value {
            GeoKeyValue::Short(_) => 1,
            GeoKeyValue::Shorts(ref v) => v.len(),
            GeoKeyValue::Doubles(ref v) => v.len(),
            GeoKeyValue::Ascii(ref s) => s.chars().count() + 1,
        }
    }

    /// The value as a single SHORT, if it is one.
    pub fn as_short(&self) -> Option<u16> {
        match self.value {
            GeoKeyValue::Short(v) => Some(v),
            GeoKeyValue::Shorts(ref v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    /// The first value as a double, widening SHORT values.
    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            GeoKeyValue::Short(v) => Some(f64::from(v)),
            GeoKeyValue::Shorts(ref v) => v.first().map(|&v| f64::from(v)),
            GeoKeyValue::Doubles(ref v) => v.first().copied(),
            GeoKeyValue::Ascii(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.value {
            GeoKeyValue::Ascii(ref s) => Some(s),
            _ => None,
        }
    }
}

/// Find the first key with the given id.
pub fn find_key(keys: &[GeoKey], id: GeoKeyId) -> Option<&GeoKey> {
    keys.iter().find(|key| key.id == id)
}

/// Expand the GeoKey directory of `directory`.
///
/// Returns an empty list when the directory has no `GeoKeyDirectoryTag`.
/// Keys are returned in directory order. A key whose value lives in an absent
/// tag, or outside the bounds of that tag's array, is skipped with a warning.
pub fn parse_geo_keys(directory: &Directory) -> CodecResult<Vec<GeoKey>> {
    let Some(entry) = directory.get(Tag::GeoKeyDirectoryTag) else {
        return Ok(Vec::new());
    };
    let geokey_dir = entry.to_u64_vec()?;

    if geokey_dir.len() < 4 {
        return Err(FormatError::GeoKeyDirectoryTruncated {
            expected: 4,
            found: geokey_dir.len(),
        }
        .into());
    }

    let num_keys = geokey_dir[3] as usize;
    let expected = 4 + 4 * num_keys;
    if geokey_dir.len() < expected {
        return Err(FormatError::GeoKeyDirectoryTruncated {
            expected,
            found: geokey_dir.len(),
        }
        .into());
    }

    let mut keys = Vec::with_capacity(num_keys);
    for tuple in geokey_dir[4..expected].chunks_exact(4) {
        // Each keyEntry is made up of SHORTS: KeyID, TIFFTagLocation, Count, Value_Offset
        let id = GeoKeyId::from_u16_exhaustive(u16::try_from(tuple[0])?);
        let location = u16::try_from(tuple[1])?;
        let count = tuple[2] as usize;
        let offset = tuple[3] as usize;

        if location == 0 {
            keys.push(GeoKey::short(id, u16::try_from(tuple[3])?));
            continue;
        }

        let location = Tag::from_u16_exhaustive(location);
        let value = match location {
            // SHORT values at the end of the key directory itself.
            Tag::GeoKeyDirectoryTag => slice(&geokey_dir, offset, count)
                .map(|v| v.iter().map(|&s| s as u16).collect())
                .map(GeoKeyValue::Shorts),
            other => match directory.get(other) {
                Some(aux) => resolve(aux, offset, count),
                None => {
                    warn!(
                        "GeoKey {:?} refers to tag {:?}, which is absent, skipping",
                        id, other
                    );
                    continue;
                }
            },
        };

        match value {
            Some(value) => keys.push(GeoKey::new(id, value)),
            None => warn!(
                "GeoKey {:?} refers to values {}..{} outside of tag {:?}, skipping",
                id,
                offset,
                offset + count,
                location
            ),
        }
    }

    Ok(keys)
}

fn slice<T>(values: &[T], offset: usize, count: usize) -> Option<&[T]> {
    values.get(offset..offset.checked_add(count)?)
}

fn resolve(aux: &DirectoryEntry, offset: usize, count: usize) -> Option<GeoKeyValue> {
    match aux.value() {
        Value::Doubles(doubles) => slice(doubles, offset, count)
            .map(<[f64]>::to_vec)
            .map(GeoKeyValue::Doubles),
        Value::Integers(ints) => slice(ints, offset, count)
            .map(|v| v.iter().map(|&i| i as u16).collect())
            .map(GeoKeyValue::Shorts),
        Value::Ascii(text) => {
            let chars: Vec<char> = text.chars().collect();
            let mut value: String = slice(&chars, offset, count)?.iter().collect();
            if value.ends_with(ASCII_SEPARATOR) {
                value.pop();
            }
            Some(GeoKeyValue::Ascii(value))
        }
    }
}

/// Build the directory entries that store `keys`.
///
/// Always returns a `GeoKeyDirectoryTag` entry, followed by a
/// `GeoDoubleParamsTag` and a `GeoAsciiParamsTag` entry when any key needs
/// them. Keys are stored in the given order.
pub fn encode_geo_keys(keys: &[GeoKey]) -> CodecResult<Vec<DirectoryEntry>> {
    let header_len = 4 + 4 * keys.len();
    let mut directory: Vec<u16> = Vec::with_capacity(header_len);
    let mut shorts: Vec<u16> = Vec::new();
    let mut doubles: Vec<f64> = Vec::new();
    let mut has_doubles = false;
    let mut ascii = String::new();

    directory.extend_from_slice(&[
        KEY_DIRECTORY_VERSION,
        KEY_REVISION,
        MINOR_REVISION,
        u16::try_from(keys.len())?,
    ]);

    for key in keys {
        let count = u16::try_from(key.count())?;
        let (location, offset) = match key.value {
            GeoKeyValue::Short(value) => (0, value),
            GeoKeyValue::Shorts(ref values) => {
                let offset = u16::try_from(header_len + shorts.len())?;
                shorts.extend_from_slice(values);
                (Tag::GeoKeyDirectoryTag.to_u16(), offset)
            }
            GeoKeyValue::Doubles(ref values) => {
                let offset = u16::try_from(doubles.len())?;
                doubles.extend_from_slice(values);
                has_doubles = true;
                (Tag::GeoDoubleParamsTag.to_u16(), offset)
            }
            GeoKeyValue::Ascii(ref text) => {
                let offset = u16::try_from(ascii.chars().count())?;
                ascii.push_str(text);
                ascii.push(ASCII_SEPARATOR);
                (Tag::GeoAsciiParamsTag.to_u16(), offset)
            }
        };
        directory.extend_from_slice(&[key.id.to_u16(), location, count, offset]);
    }
    directory.extend_from_slice(&shorts);

    let mut entries = vec![DirectoryEntry::shorts(Tag::GeoKeyDirectoryTag, &directory)];
    // An empty double array still needs the tag its location points at.
    if has_doubles {
        entries.push(DirectoryEntry::doubles(Tag::GeoDoubleParamsTag, &doubles));
    }
    if !ascii.is_empty() {
        entries.push(DirectoryEntry::ascii(Tag::GeoAsciiParamsTag, &ascii)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;

    fn directory_of(entries: Vec<DirectoryEntry>) -> Directory {
        let mut dir = Directory::empty();
        dir.extend(entries);
        dir
    }

    #[test]
    fn no_key_directory_means_no_keys() {
        let dir = directory_of(vec![DirectoryEntry::shorts(Tag::ImageWidth, &[10])]);
        assert!(parse_geo_keys(&dir).unwrap().is_empty());
    }

    #[test]
    fn expands_inline_and_indirect_keys() {
        let dir = directory_of(vec![
            DirectoryEntry::shorts(
                Tag::GeoKeyDirectoryTag,
                &[
                    1, 1, 0, 4, //
                    1024, 0, 1, 1, //
                    1026, 34737, 7, 0, //
                    3081, 34736, 1, 1, //
                    4099, 34735, 2, 20, //
                    9001, 9002,
                ],
            ),
            DirectoryEntry::doubles(Tag::GeoDoubleParamsTag, &[1.0, 45.5]),
            DirectoryEntry::ascii(Tag::GeoAsciiParamsTag, "WGS 84|").unwrap(),
        ]);

        let keys = parse_geo_keys(&dir).unwrap();
        assert_eq!(
            keys,
            vec![
                GeoKey::short(GeoKeyId::GTModelTypeGeoKey, 1),
                GeoKey::ascii(GeoKeyId::GTCitationGeoKey, "WGS 84"),
                GeoKey::doubles(GeoKeyId::ProjNatOriginLatGeoKey, &[45.5]),
                GeoKey::new(
                    GeoKeyId::VerticalUnitsGeoKey,
                    GeoKeyValue::Shorts(vec![9001, 9002])
                ),
            ]
        );
    }

    #[test]
    fn keys_pointing_to_absent_tags_are_skipped() {
        let dir = directory_of(vec![DirectoryEntry::shorts(
            Tag::GeoKeyDirectoryTag,
            &[1, 1, 0, 2, 3081, 34736, 1, 0, 1024, 0, 1, 2],
        )]);
        let keys = parse_geo_keys(&dir).unwrap();
        assert_eq!(keys, vec![GeoKey::short(GeoKeyId::GTModelTypeGeoKey, 2)]);
    }

    #[test]
    fn out_of_range_slices_are_skipped() {
        let dir = directory_of(vec![
            DirectoryEntry::shorts(Tag::GeoKeyDirectoryTag, &[1, 1, 0, 1, 3081, 34736, 2, 1]),
            DirectoryEntry::doubles(Tag::GeoDoubleParamsTag, &[1.0, 2.0]),
        ]);
        assert!(parse_geo_keys(&dir).unwrap().is_empty());
    }

    #[test]
    fn truncated_directory_is_an_error() {
        let dir = directory_of(vec![DirectoryEntry::shorts(
            Tag::GeoKeyDirectoryTag,
            &[1, 1, 0, 2, 1024, 0, 1, 1],
        )]);
        assert!(matches!(
            parse_geo_keys(&dir),
            Err(CodecError::Format(FormatError::GeoKeyDirectoryTruncated {
                expected: 12,
                found: 8
            }))
        ));
    }

    #[test]
    fn encoded_keys_expand_to_the_same_list() {
        let keys = vec![
            GeoKey::short(GeoKeyId::GTModelTypeGeoKey, 1),
            GeoKey::ascii(GeoKeyId::GTCitationGeoKey, "UTM zone 33N"),
            GeoKey::short(GeoKeyId::ProjCoordTransGeoKey, 1),
            GeoKey::doubles(GeoKeyId::ProjNatOriginLongGeoKey, &[15.0]),
            GeoKey::new(GeoKeyId::Unknown(5000), GeoKeyValue::Shorts(vec![3, 4, 5])),
            GeoKey::doubles(GeoKeyId::ProjScaleAtNatOriginGeoKey, &[0.9996]),
            GeoKey::ascii(GeoKeyId::GeogCitationGeoKey, "WGS 84"),
            GeoKey::doubles(GeoKeyId::ProjFalseEastingGeoKey, &[]),
        ];

        let entries = encode_geo_keys(&keys).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[2].as_str(),
            Some("UTM zone 33N|WGS 84|\0"),
            "strings are '|' terminated and the whole field NUL terminated"
        );

        let dir = directory_of(entries);
        assert_eq!(parse_geo_keys(&dir).unwrap(), keys);
    }

    #[test]
    fn empty_double_arrays_keep_their_tag() {
        let keys = vec![
            GeoKey::short(GeoKeyId::GTModelTypeGeoKey, 1),
            GeoKey::doubles(GeoKeyId::ProjNatOriginLatGeoKey, &[]),
        ];
        let entries = encode_geo_keys(&keys).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].tag(), Tag::GeoDoubleParamsTag);
        assert_eq!(entries[1].count(), 0);

        let dir = directory_of(entries);
        assert_eq!(parse_geo_keys(&dir).unwrap(), keys);
    }

    #[test]
    fn inline_keys_need_no_auxiliary_tags() {
        let entries = encode_geo_keys(&[
            GeoKey::short(GeoKeyId::GTModelTypeGeoKey, 2),
            GeoKey::short(GeoKeyId::GeographicTypeGeoKey, 4326),
        ])
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].as_ints().unwrap(),
            &[1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326][..]
        );
    }
}
