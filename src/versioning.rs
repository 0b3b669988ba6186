//! Stamp a file with a computed `major.minor.build` version and archive it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, ReviewError};
use crate::patterns::ArchiveBuildMatcher;

/// Token replaced by the version string in the file body, header and footer.
pub const VERSION_TOKEN: &str = "{fileversion}";
/// Escaped form of [`VERSION_TOKEN`]; left exactly as written.
pub const ESCAPED_VERSION_TOKEN: &str = "{{fileversion}}";
const RESERVED_TOKEN: &str = "\u{E000}fileversion\u{E000}";

pub const DEFAULT_BUILD_ZERO: u32 = 101;
pub const DEFAULT_BUILD_STEP: u32 = 3;
pub const DEFAULT_HEADER: &str = "-- header: ({fileversion})\n";
pub const DEFAULT_FOOTER: &str = "\n-- footer: ({fileversion})";

/// A literal substring and what to replace it with in the archived copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

/// Versioning settings as read from configuration; required fields may be
/// absent until [`VersionSettings::validate`] is called.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_folder: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minor_description: Option<String>,
    pub build_zero: u32,
    pub build_step: u32,
    pub header: String,
    pub footer: String,
    pub replacements: Vec<Replacement>,
    pub confirm: bool,
    pub write_back: bool,
}

impl Default for VersionSettings {
    fn default() -> Self {
        Self {
            deployment_folder: None,
            prefix: None,
            suffix: None,
            major: None,
            major_description: None,
            minor: None,
            minor_description: None,
            build_zero: DEFAULT_BUILD_ZERO,
            build_step: DEFAULT_BUILD_STEP,
            header: DEFAULT_HEADER.to_string(),
            footer: DEFAULT_FOOTER.to_string(),
            replacements: Vec::new(),
            confirm: false,
            write_back: true,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl VersionSettings {
    /// Check required fields and resolve the archive folder. No file system
    /// access happens here, so a failure leaves no side effects.
    pub fn validate(&self, project_path: &Path) -> Result<ValidatedVersioning> {
        let mut missing = Vec::new();

        let deployment_folder = self
            .deployment_folder
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty());
        if deployment_folder.is_none() {
            missing.push("deployment_folder".to_string());
        }
        let prefix = non_empty(&self.prefix);
        if prefix.is_none() {
            missing.push("prefix".to_string());
        }
        let suffix = non_empty(&self.suffix);
        if suffix.is_none() {
            missing.push("suffix".to_string());
        }
        if self.major.is_none() {
            missing.push("major".to_string());
        }
        if self.minor.is_none() {
            missing.push("minor".to_string());
        }

        let major_description = non_empty(&self.major_description);
        if major_description.is_none() {
            warn!("no version major description set");
        }
        let minor_description = non_empty(&self.minor_description);
        if minor_description.is_none() {
            warn!("no version minor description set");
        }
        if self.replacements.is_empty() {
            warn!("no replacements set");
        }

        match (deployment_folder, prefix, suffix, self.major, self.minor) {
            (Some(deployment_folder), Some(prefix), Some(suffix), Some(major), Some(minor)) => {
                let archive_dir = archive_folder(
                    deployment_folder,
                    project_path,
                    major,
                    major_description,
                    minor,
                    minor_description,
                );
                Ok(ValidatedVersioning {
                    archive_dir,
                    prefix: prefix.to_string(),
                    suffix: suffix.to_string(),
                    major,
                    minor,
                    build_zero: self.build_zero,
                    build_step: self.build_step,
                    header: self.header.clone(),
                    footer: self.footer.clone(),
                    replacements: self.replacements.clone(),
                    confirm: self.confirm,
                    write_back: self.write_back,
                })
            }
            _ => Err(ReviewError::MissingSettings(missing)),
        }
    }
}

/// `<deployment>/<major>[ - desc]/<minor>[ - desc]`, with a relative
/// deployment folder taken from the project path.
pub fn archive_folder(
    deployment_folder: &Path,
    project_path: &Path,
    major: u32,
    major_description: Option<&str>,
    minor: u32,
    minor_description: Option<&str>,
) -> PathBuf {
    let label = |n: u32, description: Option<&str>| match description {
        Some(d) => format!("{} - {}", n, d),
        None => n.to_string(),
    };
    let base = if deployment_folder.is_absolute() {
        deployment_folder.to_path_buf()
    } else {
        project_path.join(deployment_folder)
    };
    base.join(label(major, major_description))
        .join(label(minor, minor_description))
}

/// Build numbers already archived for `major.minor`. Creates the archive
/// directory when it does not exist yet.
pub fn existing_builds(
    archive_dir: &Path,
    prefix: &str,
    suffix: &str,
    major: u32,
    minor: u32,
) -> Result<Vec<u32>> {
    fs::create_dir_all(archive_dir).map_err(|e| ReviewError::io(archive_dir, e))?;

    let matcher = ArchiveBuildMatcher::new(prefix, suffix, major, minor)?;
    let mut builds = Vec::new();
    for entry in fs::read_dir(archive_dir).map_err(|e| ReviewError::io(archive_dir, e))? {
        let entry = entry.map_err(|e| ReviewError::io(archive_dir, e))?;
        if let Some(build) = matcher.build_of(&entry.file_name().to_string_lossy()) {
            builds.push(build);
        }
    }
    builds.sort_unstable();
    Ok(builds)
}

/// Highest archived build plus `build_step`, or `build_zero` for an empty
/// archive.
pub fn next_build(
    archive_dir: &Path,
    prefix: &str,
    suffix: &str,
    major: u32,
    minor: u32,
    build_step: u32,
    build_zero: u32,
) -> Result<u32> {
    let builds = existing_builds(archive_dir, prefix, suffix, major, minor)?;
    Ok(next_build_from(&builds, build_step, build_zero))
}

fn next_build_from(builds: &[u32], build_step: u32, build_zero: u32) -> u32 {
    builds
        .iter()
        .max()
        .map(|max| max.saturating_add(build_step))
        .unwrap_or(build_zero)
}

/// Replace [`VERSION_TOKEN`] with `version`, keeping [`ESCAPED_VERSION_TOKEN`]
/// untouched.
pub fn substitute_version(text: &str, version: &str) -> String {
    text.replace(ESCAPED_VERSION_TOKEN, RESERVED_TOKEN)
        .replace(VERSION_TOKEN, version)
        .replace(RESERVED_TOKEN, ESCAPED_VERSION_TOKEN)
}

pub fn apply_replacements(text: &str, replacements: &[Replacement]) -> String {
    replacements
        .iter()
        .filter(|r| !r.from.is_empty())
        .fold(text.to_string(), |acc, r| acc.replace(&r.from, &r.to))
}

/// Settings that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedVersioning {
    pub archive_dir: PathBuf,
    pub prefix: String,
    pub suffix: String,
    pub major: u32,
    pub minor: u32,
    pub build_zero: u32,
    pub build_step: u32,
    pub header: String,
    pub footer: String,
    pub replacements: Vec<Replacement>,
    pub confirm: bool,
    pub write_back: bool,
}

/// The proposed build for one source file.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub source: PathBuf,
    pub file_name: String,
    pub existing_builds: Vec<u32>,
    pub build: u32,
}

impl ValidatedVersioning {
    pub fn version_string(&self, build: u32) -> String {
        format!("{}.{}.{}", self.major, self.minor, build)
    }

    pub fn archive_name(&self, file_name: &str, build: u32) -> String {
        format!(
            "{}{}{}{}",
            self.prefix,
            self.version_string(build),
            self.suffix,
            file_name
        )
    }

    pub fn plan(&self, source: &Path) -> Result<BuildPlan> {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ReviewError::InvalidSource(source.to_path_buf()))?;
        let existing = existing_builds(
            &self.archive_dir,
            &self.prefix,
            &self.suffix,
            self.major,
            self.minor,
        )?;
        let build = next_build_from(&existing, self.build_step, self.build_zero);
        debug!(?existing, build, "planned build");
        Ok(BuildPlan {
            source: source.to_path_buf(),
            file_name,
            existing_builds: existing,
            build,
        })
    }

    /// Archive `plan.source` as `build`, which may differ from the planned
    /// one when the caller overrides it.
    pub fn archive(&self, plan: &BuildPlan, build: u32) -> Result<StampOutcome> {
        let request = StampRequest {
            source: plan.source.clone(),
            archive_path: self
                .archive_dir
                .join(self.archive_name(&plan.file_name, build)),
            build,
            version: self.version_string(build),
            existing_builds: plan.existing_builds.clone(),
            header: self.header.clone(),
            footer: self.footer.clone(),
            replacements: self.replacements.clone(),
            write_back: self.write_back,
        };
        stamp_and_archive(&request)
    }
}

#[derive(Debug, Clone)]
pub struct StampRequest {
    pub source: PathBuf,
    pub archive_path: PathBuf,
    pub build: u32,
    pub version: String,
    pub existing_builds: Vec<u32>,
    pub header: String,
    pub footer: String,
    pub replacements: Vec<Replacement>,
    pub write_back: bool,
}

#[derive(Debug, Clone)]
pub struct StampOutcome {
    pub archive_path: PathBuf,
    pub version: String,
    pub wrote_back: bool,
}

/// Copy the source into the archive and stamp both copies with the version.
pub fn stamp_and_archive(request: &StampRequest) -> Result<StampOutcome> {
    if request.existing_builds.contains(&request.build) {
        return Err(ReviewError::BuildExists {
            build: request.build,
        });
    }
    if !request.source.is_file() {
        return Err(ReviewError::InvalidSource(request.source.clone()));
    }

    fs::copy(&request.source, &request.archive_path)
        .map_err(|e| ReviewError::io(&request.archive_path, e))?;

    let contents = match fs::read_to_string(&request.archive_path) {
        Ok(contents) => contents,
        Err(e) => {
            // do not leave an unstamped copy behind
            let _ = fs::remove_file(&request.archive_path);
            return Err(ReviewError::io(&request.archive_path, e));
        }
    };

    let body = substitute_version(&contents, &request.version);
    let header = substitute_version(&request.header, &request.version);
    let footer = substitute_version(&request.footer, &request.version);
    let wrapped = format!("{}{}{}", header, body, footer);
    let archived = apply_replacements(&wrapped, &request.replacements);

    fs::write(&request.archive_path, archived)
        .map_err(|e| ReviewError::io(&request.archive_path, e))?;

    if request.write_back {
        fs::write(&request.source, &body).map_err(|e| ReviewError::io(&request.source, e))?;
    }

    info!(
        archive = %request.archive_path.display(),
        version = %request.version,
        "archived versioned copy"
    );

    Ok(StampOutcome {
        archive_path: request.archive_path.clone(),
        version: request.version.clone(),
        wrote_back: request.write_back,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_settings(deployment: &Path) -> VersionSettings {
        VersionSettings {
            deployment_folder: Some(deployment.to_path_buf()),
            prefix: Some("PRE".to_string()),
            suffix: Some("SUF_".to_string()),
            major: Some(1),
            minor: Some(0),
            ..VersionSettings::default()
        }
    }

    fn create_request(source: &Path, archive: &Path, build: u32, existing: Vec<u32>) -> StampRequest {
        StampRequest {
            source: source.to_path_buf(),
            archive_path: archive.to_path_buf(),
            build,
            version: format!("1.0.{}", build),
            existing_builds: existing,
            header: "-- v{fileversion}\n".to_string(),
            footer: "\n-- end {fileversion}".to_string(),
            replacements: Vec::new(),
            write_back: false,
        }
    }

    #[test]
    fn test_next_build_after_existing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("PRE1.0.101SUF_x.sql"), "").unwrap();
        fs::write(dir.path().join("PRE1.0.104SUF_x.sql"), "").unwrap();
        fs::write(dir.path().join("PRE1.1.900SUF_x.sql"), "").unwrap();

        let build = next_build(dir.path(), "PRE", "SUF", 1, 0, 3, 101).unwrap();
        assert_eq!(build, 107);
    }

    #[test]
    fn test_next_build_empty_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("1").join("0");

        let build = next_build(&archive, "PRE", "SUF", 1, 0, 3, 101).unwrap();
        assert_eq!(build, 101);
        assert!(archive.is_dir());
    }

    #[test]
    fn test_next_build_is_numeric_not_lexicographic() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("PRE1.0.99SUF_x.sql"), "").unwrap();
        fs::write(dir.path().join("PRE1.0.101SUF_x.sql"), "").unwrap();

        assert_eq!(next_build(dir.path(), "PRE", "SUF", 1, 0, 1, 0).unwrap(), 102);
    }

    #[test]
    fn test_validate_reports_every_missing_field() {
        let settings = VersionSettings {
            prefix: Some(String::new()),
            major: Some(2),
            ..VersionSettings::default()
        };
        match settings.validate(Path::new("/project")) {
            Err(ReviewError::MissingSettings(fields)) => {
                assert_eq!(fields, vec!["deployment_folder", "prefix", "suffix", "minor"]);
            }
            other => panic!("expected missing settings, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_builds_archive_folder() {
        let mut settings = create_settings(Path::new("deploy"));
        settings.major_description = Some("Genesis".to_string());
        let validated = settings.validate(Path::new("/project")).unwrap();
        assert_eq!(validated.archive_dir, PathBuf::from("/project/deploy/1 - Genesis/0"));
        assert_eq!(validated.archive_name("x.sql", 107), "PRE1.0.107SUF_x.sql");
        assert_eq!(validated.build_zero, DEFAULT_BUILD_ZERO);
        assert_eq!(validated.build_step, DEFAULT_BUILD_STEP);
    }

    #[test]
    fn test_substitute_version_keeps_escaped_token() {
        let text = "-- version {fileversion}\nSELECT '{{fileversion}}'";
        let stamped = substitute_version(text, "1.0.107");
        assert_eq!(stamped, "-- version 1.0.107\nSELECT '{{fileversion}}'");
    }

    #[test]
    fn test_apply_replacements() {
        let replacements = vec![
            Replacement {
                from: "$DB$".to_string(),
                to: "Sales".to_string(),
            },
            Replacement {
                from: String::new(),
                to: "ignored".to_string(),
            },
        ];
        assert_eq!(apply_replacements("USE $DB$;", &replacements), "USE Sales;");
    }

    #[test]
    fn test_stamp_and_archive() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("usp.dbo.GetUser.sql");
        fs::write(&source, "-- {fileversion}\nSELECT '{{fileversion}}' FROM $T$").unwrap();
        let archive = dir.path().join("PRE1.0.101SUF_usp.dbo.GetUser.sql");

        let mut request = create_request(&source, &archive, 101, vec![]);
        request.replacements = vec![Replacement {
            from: "$T$".to_string(),
            to: "dbo.Users".to_string(),
        }];
        request.write_back = true;

        let outcome = stamp_and_archive(&request).unwrap();
        assert_eq!(outcome.version, "1.0.101");
        assert!(outcome.wrote_back);

        let archived = fs::read_to_string(&archive).unwrap();
        assert_eq!(
            archived,
            "-- v1.0.101\n-- 1.0.101\nSELECT '{{fileversion}}' FROM dbo.Users\n-- end 1.0.101"
        );

        // write-back keeps the stamped body, without header, footer or replacements
        let source_after = fs::read_to_string(&source).unwrap();
        assert_eq!(source_after, "-- 1.0.101\nSELECT '{{fileversion}}' FROM $T$");
    }

    #[test]
    fn test_stamp_refuses_existing_build() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("x.sql");
        fs::write(&source, "-- {fileversion}").unwrap();
        let archive = dir.path().join("PRE1.0.104SUF_x.sql");

        let request = create_request(&source, &archive, 104, vec![101, 104]);
        let result = stamp_and_archive(&request);

        assert!(matches!(result, Err(ReviewError::BuildExists { build: 104 })));
        assert!(!archive.exists());
        assert_eq!(fs::read_to_string(&source).unwrap(), "-- {fileversion}");
    }

    #[test]
    fn test_plan_and_archive_roundtrip() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("view.sales.Orders.sql");
        fs::write(&source, "SELECT 1 -- {fileversion}").unwrap();

        let validated = create_settings(&dir.path().join("deploy"))
            .validate(dir.path())
            .unwrap();

        let first = validated.plan(&source).unwrap();
        assert_eq!(first.build, 101);
        validated.archive(&first, first.build).unwrap();

        let second = validated.plan(&source).unwrap();
        assert_eq!(second.existing_builds, vec![101]);
        assert_eq!(second.build, 104);

        // asking for an archived build again is refused
        assert!(matches!(
            validated.archive(&second, 101),
            Err(ReviewError::BuildExists { build: 101 })
        ));
    }
}
