use std::fs;
use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ReviewError};
use crate::renderer::{BY_OBJECT_FILE, BY_VERSION_FILE};
use crate::todo::TodoSettings;
use crate::versioning::VersionSettings;

pub const CONFIG_FILE_NAME: &str = "todoreview.toml";
pub const ENV_PREFIX: &str = "TODOREVIEW";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub scanning: ScanningConfig,
    pub changelog: ChangelogConfig,
    pub versioning: VersionSettings,
    pub todo: TodoSettings,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Base for every relative path; the working directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
    pub follow_symlinks: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangelogConfig {
    pub source_paths: Vec<PathBuf>,
    pub output_path: PathBuf,
    pub by_object_file: String,
    pub by_version_file: String,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            source_paths: vec![PathBuf::from(".")],
            output_path: PathBuf::from("changelog"),
            by_object_file: BY_OBJECT_FILE.to_string(),
            by_version_file: BY_VERSION_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub verbose: bool,
    pub colors: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            colors: true,
        }
    }
}

/// `<config dir>/todoreview.toml` for the current user, if a home directory
/// can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "todoreview").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

impl CliConfig {
    /// Defaults, then the user file, then the project file (`explicit` or
    /// `./todoreview.toml`), then `TODOREVIEW__SECTION__KEY` variables.
    /// Only an explicitly named file has to exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(user) = user_config_path() {
            debug!(path = %user.display(), "user config");
            builder = builder.add_source(File::from(user).format(FileFormat::Toml).required(false));
        }

        let project = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        debug!(path = %project.display(), "project config");
        builder = builder.add_source(
            File::from(project)
                .format(FileFormat::Toml)
                .required(explicit.is_some()),
        );

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ReviewError::Config(e.to_string()))
    }

    /// `cli_override`, then `scanning.project_path`, then the working
    /// directory.
    pub fn project_dir(&self, cli_override: Option<&Path>) -> PathBuf {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.scanning.project_path.clone())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ReviewError::Config(e.to_string()))
    }

    /// Write the default configuration to `path`; an existing file is left
    /// alone.
    pub fn write_default(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(ReviewError::Config(format!(
                "{} already exists",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ReviewError::io(parent, e))?;
        }
        let text = Self::default().to_toml()?;
        fs::write(path, text).map_err(|e| ReviewError::io(path, e))
    }
}
