use crate::types::{ObjectKey, ObjectRecord, Version, VersionCoordinate, VersionEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator placed between comments that landed on the same build.
pub const COMMENT_SEPARATOR: &str = "<br>";

/// Object definition files keyed by (type label, schema, name).
///
/// Ordered so that rendering never depends on hash iteration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectIndex {
    objects: BTreeMap<ObjectKey, ObjectRecord>,
}

impl ObjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless its key is already present. The first file
    /// seen for a key wins; returns `false` when the record was dropped.
    pub fn insert(&mut self, record: ObjectRecord) -> bool {
        if self.objects.contains_key(&record.key) {
            return false;
        }
        self.objects.insert(record.key.clone(), record);
        true
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&ObjectRecord> {
        self.objects.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.objects.values()
    }

    /// Records grouped as type label -> schema -> records, all ascending.
    pub fn grouped(&self) -> BTreeMap<&str, BTreeMap<&str, Vec<&ObjectRecord>>> {
        let mut groups: BTreeMap<&str, BTreeMap<&str, Vec<&ObjectRecord>>> = BTreeMap::new();
        for record in self.objects.values() {
            groups
                .entry(record.key.type_label.as_str())
                .or_default()
                .entry(record.key.schema.as_str())
                .or_default()
                .push(record);
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// All entries that share one `major.minor.build`, in the order seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    entries: Vec<VersionEntry>,
}

impl BuildRecord {
    fn new(entry: VersionEntry) -> Self {
        Self {
            entries: vec![entry],
        }
    }

    pub fn entries(&self) -> &[VersionEntry] {
        &self.entries
    }

    fn first(&self) -> &VersionEntry {
        // never empty: created with one entry and only appended to
        &self.entries[0]
    }

    pub fn author(&self) -> &str {
        &self.first().author
    }

    pub fn date(&self) -> &str {
        &self.first().date
    }

    pub fn file(&self) -> &str {
        &self.first().source_file
    }

    /// Every contributing comment, joined with [`COMMENT_SEPARATOR`].
    pub fn comment(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.comment.as_str())
            .collect::<Vec<_>>()
            .join(COMMENT_SEPARATOR)
    }

    pub fn is_collision(&self) -> bool {
        self.entries.len() > 1
    }
}

pub type BuildMap = BTreeMap<VersionCoordinate, BuildRecord>;
pub type MinorMap = BTreeMap<VersionCoordinate, BuildMap>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionIndexMetadata {
    pub total_entries: usize,
    pub total_builds: usize,
    pub collisions: usize,
    pub unknown_versions: usize,
}

/// Version entries keyed by major -> minor -> build.
///
/// Entries that share a build are kept together rather than overwritten; see
/// [`BuildRecord::comment`] for how they are merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionIndex {
    majors: BTreeMap<VersionCoordinate, MinorMap>,
    metadata: VersionIndexMetadata,
}

impl VersionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: VersionEntry) {
        let Version { major, minor, build } = entry.version;
        if !major.is_known() {
            self.metadata.unknown_versions += 1;
        }
        self.metadata.total_entries += 1;

        let builds = self
            .majors
            .entry(major)
            .or_default()
            .entry(minor)
            .or_default();
        match builds.get_mut(&build) {
            Some(existing) => {
                if !existing.is_collision() {
                    self.metadata.collisions += 1;
                }
                existing.entries.push(entry);
            }
            None => {
                builds.insert(build, BuildRecord::new(entry));
                self.metadata.total_builds += 1;
            }
        }
    }

    pub fn get(&self, version: &Version) -> Option<&BuildRecord> {
        self.majors
            .get(&version.major)?
            .get(&version.minor)?
            .get(&version.build)
    }

    /// Majors from highest to lowest, unknown last.
    pub fn majors_descending(&self) -> impl Iterator<Item = (&VersionCoordinate, &MinorMap)> {
        self.majors.iter().rev()
    }

    pub fn get_metadata(&self) -> &VersionIndexMetadata {
        &self.metadata
    }

    pub fn is_empty(&self) -> bool {
        self.majors.is_empty()
    }
}
