//! Matchers for object file names, version blocks and version strings.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::types::{type_codes, type_label, Version, VersionEntry};

static OBJECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let codes = type_codes().map(regex::escape).collect::<Vec<_>>().join("|");
    Regex::new(&format!(
        r"^(?P<rubbish>.*?)(?P<type>{})\.(?P<schema>.*?)\.(?P<object>.*?)\.sql$",
        codes
    ))
    .expect("object pattern is valid")
});

static VERSION_BLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?sm)-- #region\s*\**\sversions start\s*\**?\n(?P<versions>.*?)-- #endregion\s*\**\sversions end\s*\**",
    )
    .expect("version block pattern is valid")
});

static VERSION_ENTRY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^-- (?P<date>.{20})\s*(?P<author>\w*)\s* - \((?P<version>.*?)\)\s+(?P<comment>.*)$",
    )
    .expect("version entry pattern is valid")
});

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<major>\d+)\.(?P<minor>\d+)\.(?P<build>\d+)$")
        .expect("version pattern is valid")
});

/// Parts of a recognized object definition file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    pub type_code: String,
    pub type_label: &'static str,
    pub schema: String,
    pub name: String,
}

/// Match `<junk><type>.<schema>.<object>.sql`. `None` means the file is not
/// an object definition and should be skipped.
pub fn match_object_name(file_name: &str) -> Option<ObjectName> {
    let caps = OBJECT_PATTERN.captures(file_name)?;
    let type_code = caps.name("type")?.as_str();
    Some(ObjectName {
        type_code: type_code.to_string(),
        type_label: type_label(type_code)?,
        schema: caps.name("schema")?.as_str().to_string(),
        name: caps.name("object")?.as_str().to_string(),
    })
}

/// Inner text of the first `versions start` / `versions end` region.
pub fn find_version_block(contents: &str) -> Option<&str> {
    VERSION_BLOCK_PATTERN
        .captures(contents)
        .and_then(|caps| caps.name("versions"))
        .map(|m| m.as_str())
}

/// Untrimmed fields of one version line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawVersionEntry<'a> {
    pub date: &'a str,
    pub author: &'a str,
    pub version: &'a str,
    pub comment: &'a str,
}

impl RawVersionEntry<'_> {
    pub fn parsed_version(&self) -> Version {
        parse_version(self.version).unwrap_or_else(Version::unknown)
    }

    pub fn to_entry(&self, source_file: &str) -> VersionEntry {
        VersionEntry {
            date: self.date.trim().to_string(),
            author: self.author.trim().to_string(),
            version: self.parsed_version(),
            comment: self.comment.trim().to_string(),
            source_file: source_file.to_string(),
        }
    }
}

/// Every version line of a block, top to bottom.
pub fn version_entries(block: &str) -> Vec<RawVersionEntry<'_>> {
    VERSION_ENTRY_PATTERN
        .captures_iter(block)
        .filter_map(|caps| {
            Some(RawVersionEntry {
                date: caps.name("date")?.as_str(),
                author: caps.name("author")?.as_str(),
                version: caps.name("version")?.as_str(),
                comment: caps.name("comment")?.as_str(),
            })
        })
        .collect()
}

/// Parse `X.Y.Z`. Anything else, including components too large for `u32`,
/// is a parse failure.
pub fn parse_version(text: &str) -> Option<Version> {
    let caps = VERSION_PATTERN.captures(text.trim())?;
    let major = caps.name("major")?.as_str().parse().ok()?;
    let minor = caps.name("minor")?.as_str().parse().ok()?;
    let build = caps.name("build")?.as_str().parse().ok()?;
    Some(Version::new(major, minor, build))
}

/// Recognizes archived copies `<prefix><major>.<minor>.<build><suffix>...`
/// for one fixed major/minor pair.
#[derive(Debug, Clone)]
pub struct ArchiveBuildMatcher {
    pattern: Regex,
}

impl ArchiveBuildMatcher {
    pub fn new(prefix: &str, suffix: &str, major: u32, minor: u32) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"^{}{}\.{}\.(?P<build>\d+){}",
            regex::escape(prefix),
            major,
            minor,
            regex::escape(suffix)
        ))?;
        Ok(Self { pattern })
    }

    pub fn build_of(&self, file_name: &str) -> Option<u32> {
        self.pattern
            .captures(file_name)
            .and_then(|caps| caps.name("build"))
            .and_then(|m| m.as_str().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VersionCoordinate;

    const BLOCK_FILE: &str = "\
CREATE PROCEDURE dbo.GetUser AS
-- #region ***** versions start *****
-- 2022-05-28 12:30:29 gemisigo - (1.4.12) first cut
-- 2022-06-01 08:00:00 jdoe - (1.4.13)   fixed the join
-- 2022-06-02 09:15:00 jdoe - (n/a) undated hotfix
-- #endregion ***** versions end *****
SELECT 1
";

    #[test]
    fn test_object_name_extraction() {
        let object = match_object_name("usp.dbo.GetUser.sql").unwrap();
        assert_eq!(object.type_code, "usp");
        assert_eq!(object.type_label, "Stored procedures");
        assert_eq!(object.schema, "dbo");
        assert_eq!(object.name, "GetUser");
    }

    #[test]
    fn test_object_name_with_leading_junk() {
        let object = match_object_name("0042_view.sales.Orders.sql").unwrap();
        assert_eq!(object.type_label, "Views");
        assert_eq!(object.schema, "sales");
        assert_eq!(object.name, "Orders");
    }

    #[test]
    fn test_object_name_rejects_other_files() {
        assert!(match_object_name("README.md").is_none());
        assert!(match_object_name("proc.dbo.GetUser.sql").is_none());
        assert!(match_object_name("usp.dbo.GetUser.txt").is_none());
    }

    #[test]
    fn test_find_version_block() {
        let block = find_version_block(BLOCK_FILE).unwrap();
        assert!(block.starts_with("-- 2022-05-28"));
        assert!(block.contains("undated hotfix"));
        assert!(!block.contains("versions end"));
        assert!(!block.contains("SELECT"));
    }

    #[test]
    fn test_find_version_block_absent() {
        assert!(find_version_block("SELECT 1\n-- no history here\n").is_none());
    }

    #[test]
    fn test_version_block_tolerates_plain_markers() {
        let text = "-- #region versions start\n-- 2022-05-28 12:30:29 ann - (1.0.1) x\n-- #endregion versions end\n";
        let block = find_version_block(text).unwrap();
        assert_eq!(version_entries(block).len(), 1);
    }

    #[test]
    fn test_version_entries_in_source_order() {
        let block = find_version_block(BLOCK_FILE).unwrap();
        let entries = version_entries(block);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].date.trim(), "2022-05-28 12:30:29");
        assert_eq!(entries[0].author, "gemisigo");
        assert_eq!(entries[0].version, "1.4.12");
        assert_eq!(entries[0].comment, "first cut");
        assert_eq!(entries[1].author, "jdoe");

        let entry = entries[1].to_entry("usp.dbo.GetUser.sql");
        assert_eq!(entry.comment, "fixed the join");
        assert_eq!(entry.version, Version::new(1, 4, 13));
        assert_eq!(entry.source_file, "usp.dbo.GetUser.sql");
    }

    #[test]
    fn test_unparseable_version_becomes_unknown() {
        let block = find_version_block(BLOCK_FILE).unwrap();
        let entries = version_entries(block);
        let entry = entries[2].to_entry("f.sql");
        assert_eq!(entry.version, Version::unknown());
        assert_eq!(entry.comment, "undated hotfix");
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("1.4.12"), Some(Version::new(1, 4, 12)));
        assert_eq!(parse_version(" 2.0.0 "), Some(Version::new(2, 0, 0)));
        assert_eq!(parse_version("garbage"), None);
        assert_eq!(parse_version("1.4"), None);
        assert_eq!(parse_version("1.4.99999999999"), None);

        let fallback = parse_version("garbage").unwrap_or_else(Version::unknown);
        assert_eq!(fallback.major, VersionCoordinate::Unknown);
        assert_eq!(fallback.raw_string(), "-1.-1.-1");
    }

    #[test]
    fn test_archive_build_matcher() {
        let matcher = ArchiveBuildMatcher::new("PRE", "SUF", 1, 0).unwrap();
        assert_eq!(matcher.build_of("PRE1.0.101SUF_x.sql"), Some(101));
        assert_eq!(matcher.build_of("PRE1.1.101SUF_x.sql"), None);
        assert_eq!(matcher.build_of("PRE2.0.101SUF_x.sql"), None);
        assert_eq!(matcher.build_of("other.sql"), None);
    }

    #[test]
    fn test_archive_build_matcher_escapes_prefix() {
        let matcher = ArchiveBuildMatcher::new("v(", ")_", 3, 2).unwrap();
        assert_eq!(matcher.build_of("v(3.2.7)_file.sql"), Some(7));
    }
}
