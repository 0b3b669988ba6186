use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Object type codes and the category each one is listed under.
///
/// Several codes share a category (`mod`/`new` are both tables), so the
/// changelogs group by label rather than by code.
pub const TYPE_LABELS: &[(&str, &str)] = &[
    ("fk", "Foreign keys"),
    ("ix", "Indexes"),
    ("login", "Logins"),
    ("mod", "Tables"),
    ("new", "Tables"),
    ("schema", "Schemas"),
    ("trig", "Triggers"),
    ("udf", "Functions"),
    ("ufs", "Functions"),
    ("unknown", "unknown"),
    ("usp", "Stored procedures"),
    ("view", "Views"),
];

/// Resolve a type code to its category label.
pub fn type_label(code: &str) -> Option<&'static str> {
    TYPE_LABELS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
}

pub fn type_codes() -> impl Iterator<Item = &'static str> {
    TYPE_LABELS.iter().map(|(code, _)| *code)
}

/// One component of a `major.minor.build` version.
///
/// `Unknown` stands in for a component that could not be parsed and orders
/// below every known value, so a descending listing puts it last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionCoordinate {
    Known(u32),
    Unknown,
}

impl VersionCoordinate {
    /// Integer form with `-1` for unknown.
    pub fn raw(&self) -> i64 {
        match self {
            VersionCoordinate::Known(n) => i64::from(*n),
            VersionCoordinate::Unknown => -1,
        }
    }

    /// Human readable form; `unknown_label` is used for the sentinel.
    pub fn label(&self, unknown_label: &str) -> String {
        match self {
            VersionCoordinate::Known(n) => n.to_string(),
            VersionCoordinate::Unknown => unknown_label.to_string(),
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, VersionCoordinate::Known(_))
    }
}

impl Ord for VersionCoordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (VersionCoordinate::Known(a), VersionCoordinate::Known(b)) => a.cmp(b),
            (VersionCoordinate::Known(_), VersionCoordinate::Unknown) => Ordering::Greater,
            (VersionCoordinate::Unknown, VersionCoordinate::Known(_)) => Ordering::Less,
            (VersionCoordinate::Unknown, VersionCoordinate::Unknown) => Ordering::Equal,
        }
    }
}

impl PartialOrd for VersionCoordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub const MAJOR_UNKNOWN: &str = "Major unknown";
pub const MINOR_UNKNOWN: &str = "Minor unknown";
pub const BUILD_UNKNOWN: &str = "Build unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: VersionCoordinate,
    pub minor: VersionCoordinate,
    pub build: VersionCoordinate,
}

impl Version {
    pub fn new(major: u32, minor: u32, build: u32) -> Self {
        Self {
            major: VersionCoordinate::Known(major),
            minor: VersionCoordinate::Known(minor),
            build: VersionCoordinate::Known(build),
        }
    }

    pub fn unknown() -> Self {
        Self {
            major: VersionCoordinate::Unknown,
            minor: VersionCoordinate::Unknown,
            build: VersionCoordinate::Unknown,
        }
    }

    /// `major.minor.build` with `-1` for unknown components.
    pub fn raw_string(&self) -> String {
        format!("{}.{}.{}", self.major.raw(), self.minor.raw(), self.build.raw())
    }

    /// `major.minor.build` with the "unknown" labels for unknown components.
    pub fn label_string(&self) -> String {
        format!(
            "{}.{}.{}",
            self.major.label(MAJOR_UNKNOWN),
            self.minor.label(MINOR_UNKNOWN),
            self.build.label(BUILD_UNKNOWN)
        )
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw_string())
    }
}

/// One change record taken from a version block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub date: String,
    pub author: String,
    pub version: Version,
    pub comment: String,
    pub source_file: String,
}

/// Identity of an object definition file: category label, schema, name.
///
/// Field order gives the by-object ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub type_label: String,
    pub schema: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub key: ObjectKey,
    pub type_code: String,
    pub file: String,
    /// Text between the version markers, as captured.
    pub raw_version_block: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_label_lookup() {
        assert_eq!(type_label("usp"), Some("Stored procedures"));
        assert_eq!(type_label("mod"), Some("Tables"));
        assert_eq!(type_label("new"), Some("Tables"));
        assert_eq!(type_label("proc"), None);
    }

    #[test]
    fn test_unknown_sorts_below_known() {
        let mut coords = vec![
            VersionCoordinate::Known(5),
            VersionCoordinate::Unknown,
            VersionCoordinate::Known(0),
            VersionCoordinate::Known(12),
        ];
        coords.sort();
        coords.reverse();
        assert_eq!(
            coords,
            vec![
                VersionCoordinate::Known(12),
                VersionCoordinate::Known(5),
                VersionCoordinate::Known(0),
                VersionCoordinate::Unknown,
            ]
        );
    }

    #[test]
    fn test_version_strings() {
        let v = Version::new(1, 4, 12);
        assert_eq!(v.raw_string(), "1.4.12");
        assert_eq!(v.label_string(), "1.4.12");

        let u = Version::unknown();
        assert_eq!(u.raw_string(), "-1.-1.-1");
        assert_eq!(u.label_string(), "Major unknown.Minor unknown.Build unknown");
    }
}
