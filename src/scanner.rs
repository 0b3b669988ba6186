use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use encoding_rs::ISO_8859_2;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Result, ReviewError};
use crate::patterns::{find_version_block, match_object_name, version_entries};
use crate::storage::{ObjectIndex, VersionIndex};
use crate::types::{ObjectKey, ObjectRecord, VersionEntry};

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub follow_symlinks: bool,
    pub max_depth: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file name is not `<type>.<schema>.<object>.sql`.
    NameMismatch,
    /// The file or directory could not be read.
    Unreadable(String),
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// What happened to one file.
#[derive(Debug)]
pub enum FileOutcome {
    Collected {
        record: ObjectRecord,
        entries: Vec<VersionEntry>,
    },
    /// An object file without a version section.
    NoVersionBlock,
    Skipped(SkipReason),
    Failed(ReviewError),
}

#[derive(Debug, Default)]
pub struct CollectResult {
    pub objects: ObjectIndex,
    pub versions: VersionIndex,
    pub processed: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

impl CollectResult {
    pub fn files_seen(&self) -> usize {
        self.processed.len() + self.skipped.len()
    }
}

#[derive(Debug)]
pub struct ScanReport {
    pub result: CollectResult,
    pub elapsed: Duration,
    pub files_scanned: usize,
}

/// Walks source roots and folds object files into the object and version
/// indices.
#[derive(Debug, Clone)]
pub struct VersionCollector {
    project_path: PathBuf,
    config: ScanConfig,
}

impl VersionCollector {
    pub fn new(project_path: impl Into<PathBuf>, config: ScanConfig) -> Self {
        Self {
            project_path: project_path.into(),
            config,
        }
    }

    /// Relative roots are taken from the project directory.
    pub fn resolve_root(&self, root: &Path) -> PathBuf {
        if root.is_absolute() {
            root.to_path_buf()
        } else {
            self.project_path.join(root)
        }
    }

    pub fn collect<P: AsRef<Path>>(&self, roots: &[P]) -> CollectResult {
        let mut result = CollectResult::default();

        for root in roots {
            let root = self.resolve_root(root.as_ref());
            debug!(root = %root.display(), "collecting versions");

            let mut walker = WalkDir::new(&root)
                .follow_links(self.config.follow_symlinks)
                .sort_by_file_name();
            if let Some(depth) = self.config.max_depth {
                walker = walker.max_depth(depth);
            }

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                        Self::fold(&mut result, path, FileOutcome::Failed(ReviewError::Walk(e)));
                        continue;
                    }
                };
                if entry.file_type().is_dir() {
                    continue;
                }
                let path = entry.into_path();
                let outcome = self.collect_file(&path);
                Self::fold(&mut result, path, outcome);
            }
        }

        info!(
            processed = result.processed.len(),
            skipped = result.skipped.len(),
            objects = result.objects.len(),
            "version collection finished"
        );
        result
    }

    fn fold(result: &mut CollectResult, path: PathBuf, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Collected { record, entries } => {
                debug!(path = %path.display(), entries = entries.len(), "processed");
                if !result.objects.insert(record) {
                    debug!(path = %path.display(), "object already recorded from an earlier file");
                }
                for entry in entries {
                    result.versions.insert(entry);
                }
                result.processed.push(path);
            }
            FileOutcome::NoVersionBlock => {
                debug!(path = %path.display(), "processed, no version block");
                result.processed.push(path);
            }
            FileOutcome::Skipped(reason) => {
                debug!(path = %path.display(), "skipped");
                result.skipped.push(SkippedFile { path, reason });
            }
            FileOutcome::Failed(error) => {
                debug!(path = %path.display(), %error, "failed");
                result.skipped.push(SkippedFile {
                    path,
                    reason: SkipReason::Unreadable(error.to_string()),
                });
            }
        }
    }

    /// Examine a single file. Never panics and never returns an error
    /// directly; failures come back as [`FileOutcome::Failed`].
    pub fn collect_file(&self, path: &Path) -> FileOutcome {
        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return FileOutcome::Skipped(SkipReason::NameMismatch),
        };
        let object = match match_object_name(&file_name) {
            Some(object) => object,
            None => return FileOutcome::Skipped(SkipReason::NameMismatch),
        };

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => return FileOutcome::Failed(ReviewError::io(path, e)),
        };
        // object files are stored as Latin-2; every byte maps, so this cannot fail
        let (decoded, _) = ISO_8859_2.decode_without_bom_handling(&bytes);
        let contents = normalize_line_endings(&decoded);

        let block = match find_version_block(&contents) {
            Some(block) if !block.trim().is_empty() => block,
            _ => return FileOutcome::NoVersionBlock,
        };

        let entries = version_entries(block)
            .iter()
            .map(|raw| raw.to_entry(&file_name))
            .collect();

        FileOutcome::Collected {
            record: ObjectRecord {
                key: ObjectKey {
                    type_label: object.type_label.to_string(),
                    schema: object.schema,
                    name: object.name,
                },
                type_code: object.type_code,
                file: file_name,
                raw_version_block: block.to_string(),
            },
            entries,
        }
    }

    /// Run [`collect`](Self::collect) on a blocking worker and resolve once
    /// with the whole result.
    pub async fn spawn(self, roots: Vec<PathBuf>) -> Result<ScanReport> {
        tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let result = self.collect(&roots);
            let files_scanned = result.files_seen();
            ScanReport {
                result,
                elapsed: start.elapsed(),
                files_scanned,
            }
        })
        .await
        .map_err(|e| ReviewError::Background(e.to_string()))
    }
}

/// CRLF and lone CR become LF so the block markers match on any platform.
fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}
