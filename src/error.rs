use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the todoreview library.
///
/// Per-file problems met while collecting versions are not reported through
/// this type at the top level; they are folded into the scan result as skipped
/// files. Only problems that stop an operation outright surface here.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid glob: {0}")]
    Glob(#[from] globset::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Required versioning settings are absent. Every missing field is listed.
    #[error("Missing versioning settings:\n{}", format_missing(.0))]
    MissingSettings(Vec<String>),

    #[error("Build [{build}] already exists in the archive directory")]
    BuildExists { build: u32 },

    #[error("Not a file: {}", .0.display())]
    InvalidSource(PathBuf),

    #[error("Background scan failed: {0}")]
    Background(String),
}

impl ReviewError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_missing(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| format!("  - {}", f))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, ReviewError>;
