use core::fmt;
use std::{collections::BTreeMap, num::NonZeroU64};

use crate::{ifd::DirectoryEntry, tags::Tag};

/// An Image File Directory (IFD).
///
/// A directory is a map of [`Tag`]s to [`DirectoryEntry`]s with decoded
/// payloads. A directory is produced by
/// [`GeoTiffReader`](crate::decoder::GeoTiffReader) for every IFD of a file,
/// or filled by [`GeoTiffWriter`](crate::encoder::GeoTiffWriter) before it is
/// serialized.
#[doc(alias = "IFD")]
#[derive(Clone, Default, PartialEq)]
pub struct Directory {
    /// Keyed by tag code so that iteration, and therefore serialization, is
    /// always in ascending tag order.
    pub(crate) entries: BTreeMap<u16, DirectoryEntry>,
    pub(crate) next_ifd: Option<NonZeroU64>,
}

impl Directory {
    /// Create a directory in an initial state without entries. Note that an empty directory can
    /// not be encoded in a file, it must contain at least one entry.
    pub fn empty() -> Self {
        Directory {
            entries: BTreeMap::new(),
            next_ifd: None,
        }
    }

    /// Retrieve the entry bound to a tag.
    pub fn get(&self, tag: Tag) -> Option<&DirectoryEntry> {
        self.entries.get(&tag.to_u16())
    }

    /// Check if the directory contains a specified tag.
    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag.to_u16())
    }

    /// Iterate over all known and unknown entries in ascending tag order.
    pub fn iter(&self) -> impl Iterator<Item = &DirectoryEntry> + '_ {
        self.entries.values()
    }

    /// Insert an entry, replacing any entry previously bound to the same tag.
    pub fn insert(&mut self, entry: DirectoryEntry) -> Option<DirectoryEntry> {
        self.entries.insert(entry.tag().to_u16(), entry)
    }

    pub fn remove(&mut self, tag: Tag) -> Option<DirectoryEntry> {
        self.entries.remove(&tag.to_u16())
    }

    /// Insert additional entries into the directory.
    ///
    /// Providing a tag multiple times or a tag that already exists within
    /// this directory overwrites the entry.
    pub fn extend(&mut self, iter: impl IntoIterator<Item = DirectoryEntry>) {
        for entry in iter {
            self.insert(entry);
        }
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are any entries in this directory.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the offset of the next IFD, if it was defined.
    pub fn next(&self) -> Option<u64> {
        self.next_ifd.map(NonZeroU64::get)
    }

    pub fn set_next(&mut self, next: Option<u64>) {
        self.next_ifd = next.and_then(NonZeroU64::new);
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("entries", &self.entries.values().collect::<Vec<_>>())
            .field("next_ifd", &self.next_ifd)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Directory;
    use crate::{ifd::DirectoryEntry, tags::Tag};

    #[test]
    fn insert_overwrites() {
        let mut dir = Directory::empty();
        assert_eq!(dir.len(), 0);

        dir.extend((0..10u16).map(|i| DirectoryEntry::shorts(Tag::Unknown(1), &[i])));

        assert_eq!(dir.len(), 1, "Only one tag was ever modified");
        assert_eq!(
            dir.get(Tag::Unknown(1))
                .expect("tag 1 should be present after this chain")
                .as_ints(),
            Some(&[9i64][..])
        );
    }

    #[test]
    fn iteration_order() {
        let mut dir = Directory::empty();
        for code in [34735u16, 256, 42113, 1, 259] {
            dir.insert(DirectoryEntry::shorts(Tag::from_u16_exhaustive(code), &[0]));
        }

        let iter_order: Vec<u16> = dir.iter().map(|e| e.tag().to_u16()).collect();
        assert_eq!(
            iter_order,
            vec![1, 256, 259, 34735, 42113],
            "TIFF 6.0 requires entries in ascending tag order"
        );
    }

    #[test]
    fn next_offset_zero_terminates() {
        let mut dir = Directory::empty();
        dir.set_next(Some(0));
        assert_eq!(dir.next(), None);
        dir.set_next(Some(1024));
        assert_eq!(dir.next(), Some(1024));
    }
}
