pub mod error;
pub mod types;
pub mod patterns;
pub mod scanner;
pub mod storage;
pub mod renderer;
pub mod versioning;
pub mod todo;
pub mod config;
pub mod cli;
pub mod cli_types;
pub mod ui;

// Re-export commonly used types
pub use error::{Result, ReviewError};
pub use types::*;
pub use storage::{BuildRecord, ObjectIndex, VersionIndex};
pub use scanner::{CollectResult, FileOutcome, ScanConfig, ScanReport, VersionCollector};
pub use renderer::{render_by_object, render_by_version, write_changelogs, ChangelogPaths};
pub use versioning::{stamp_and_archive, StampOutcome, StampRequest, ValidatedVersioning, VersionSettings};
pub use todo::{render_report, TodoEngine, TodoItem, TodoReport, TodoSettings};
pub use crate::config::CliConfig;
pub use cli::CliApp;
pub use ui::UIManager;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
