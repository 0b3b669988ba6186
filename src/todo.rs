//! Line-by-line scan for TODO/FIXME style annotations and the text report
//! built from the matches.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use encoding_rs::Encoding;
use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, ReviewError};

pub const DEFAULT_PRIORITY: u8 = 50;
pub const DEFAULT_HEADER_FORMAT: &str = "%d - %c files in %t secs";
pub const DEFAULT_HEADER_DATE: &str = "%A %m/%d/%y at %I:%M%p";

static PRIORITY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([0-9]{1,2})\)").expect("priority pattern is valid"));

/// A named annotation pattern. The `note` capture group, or the first group
/// when there is no `note`, becomes the reported text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPattern {
    pub name: String,
    pub regex: String,
    /// Lower weights are listed first; unweighted patterns come last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
}

impl TodoPattern {
    fn new(name: &str, regex: &str) -> Self {
        Self {
            name: name.to_string(),
            regex: regex.to_string(),
            weight: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoSettings {
    /// Default scan roots, relative to the project; the project itself when
    /// empty.
    pub include_paths: Vec<PathBuf>,
    pub patterns: Vec<TodoPattern>,
    pub case_sensitive: bool,
    pub exclude_files: Vec<String>,
    pub exclude_folders: Vec<String>,
    pub resolve_symlinks: bool,
    pub encoding: String,
    pub render: TodoRenderSettings,
}

impl Default for TodoSettings {
    fn default() -> Self {
        Self {
            include_paths: Vec::new(),
            patterns: vec![
                TodoPattern::new("TODO", r"TODO[\s]*?:+(?P<note>.*)$"),
                TodoPattern::new("NOTE", r"NOTE[\s]*?:+(?P<note>.*)$"),
                TodoPattern::new("FIXME", r"FIX ?ME[\s]*?:+\s*(?P<note>\S.*)$"),
                TodoPattern::new("CHANGED", r"CHANGED[\s]*?:+\s*(?P<note>\S.*)$"),
            ],
            case_sensitive: false,
            exclude_files: vec!["*.min.js".to_string()],
            exclude_folders: vec![
                "**/.git".to_string(),
                "**/node_modules".to_string(),
                "**/target".to_string(),
            ],
            resolve_symlinks: true,
            encoding: "utf-8".to_string(),
            render: TodoRenderSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoRenderSettings {
    pub maxspaces: usize,
    pub include_folder: bool,
    /// Parent folders shown before the file name; `0` shows the path
    /// relative to the scanned root.
    pub folder_depth: usize,
    pub header_format: String,
    pub header_date: String,
}

impl Default for TodoRenderSettings {
    fn default() -> Self {
        Self {
            maxspaces: 50,
            include_folder: false,
            folder_depth: 1,
            header_format: DEFAULT_HEADER_FORMAT.to_string(),
            header_date: DEFAULT_HEADER_DATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub file: PathBuf,
    pub pattern: String,
    pub note: String,
    pub line: usize,
    pub priority: u8,
}

#[derive(Debug)]
pub struct TodoReport {
    pub items: Vec<TodoItem>,
    pub elapsed: Duration,
    pub files_scanned: usize,
}

#[derive(Debug)]
struct CompiledPattern {
    name: String,
    weight: Option<i64>,
    regex: Regex,
}

#[derive(Debug)]
pub struct TodoEngine {
    patterns: Vec<CompiledPattern>,
    exclude_files: GlobSet,
    exclude_folders: GlobSet,
    encoding: &'static Encoding,
    resolve_symlinks: bool,
}

fn build_globset(globs: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(Glob::new(glob)?);
    }
    Ok(builder.build()?)
}

impl TodoEngine {
    pub fn new(settings: &TodoSettings) -> Result<Self> {
        let patterns = settings
            .patterns
            .iter()
            .map(|p| {
                let regex = RegexBuilder::new(&p.regex)
                    .case_insensitive(!settings.case_sensitive)
                    .build()?;
                Ok(CompiledPattern {
                    name: p.name.clone(),
                    weight: p.weight,
                    regex,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let encoding = Encoding::for_label(settings.encoding.as_bytes()).ok_or_else(|| {
            ReviewError::Config(format!("unknown encoding: {}", settings.encoding))
        })?;

        Ok(Self {
            patterns,
            exclude_files: build_globset(&settings.exclude_files)?,
            exclude_folders: build_globset(&settings.exclude_folders)?,
            encoding,
            resolve_symlinks: settings.resolve_symlinks,
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if self.resolve_symlinks {
            fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
        } else {
            path.to_path_buf()
        }
    }

    fn folder_excluded(&self, path: &Path) -> bool {
        self.exclude_folders.is_match(path)
    }

    fn file_excluded(&self, path: &Path) -> bool {
        self.exclude_files.is_match(path)
            || path
                .parent()
                .map(|parent| parent.ancestors().any(|a| self.folder_excluded(a)))
                .unwrap_or(false)
    }

    /// Files under `dirs` plus the explicit `files`, deduplicated and with
    /// excluded files and folders removed.
    pub fn files(&self, dirs: &[PathBuf], files: &[PathBuf]) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        for dir in dirs {
            let walker = WalkDir::new(self.resolve(dir))
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| !(e.file_type().is_dir() && self.folder_excluded(e.path())));
            for entry in walker {
                match entry {
                    Ok(entry) if !entry.file_type().is_dir() => candidates.push(entry.into_path()),
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "walk error"),
                }
            }
        }
        candidates.extend(files.iter().cloned());

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .map(|p| self.resolve(&p))
            .filter(|p| !self.file_excluded(p))
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }

    /// Matches in one file, or `None` when it cannot be read or decoded.
    pub fn extract(&self, path: &Path) -> Option<Vec<TodoItem>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "unreadable");
                return None;
            }
        };
        let text = match self
            .encoding
            .decode_without_bom_handling_and_without_replacement(&bytes)
        {
            Some(text) => text,
            None => {
                debug!(path = %path.display(), encoding = self.encoding.name(), "undecodable");
                return None;
            }
        };

        let mut items = Vec::new();
        for (index, line) in text.lines().enumerate() {
            for pattern in &self.patterns {
                for caps in pattern.regex.captures_iter(line) {
                    let note = caps
                        .name("note")
                        .or_else(|| caps.get(1))
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str().trim().to_string())
                        .unwrap_or_default();
                    let priority = PRIORITY_PATTERN
                        .captures(&note)
                        .and_then(|c| c.get(1))
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(DEFAULT_PRIORITY);
                    items.push(TodoItem {
                        file: path.to_path_buf(),
                        pattern: pattern.name.clone(),
                        note,
                        line: index + 1,
                        priority,
                    });
                }
            }
        }
        Some(items)
    }

    /// Scan every file; unreadable files are counted but contribute nothing.
    pub fn process(&self, dirs: &[PathBuf], files: &[PathBuf]) -> (Vec<TodoItem>, usize) {
        let paths = self.files(dirs, files);
        let count = paths.len();
        let items = paths
            .iter()
            .filter_map(|p| self.extract(p))
            .flatten()
            .collect();
        (items, count)
    }

    /// Run [`process`](Self::process) on a blocking worker. The engine stays
    /// shared so the caller can still sort and render the result.
    pub async fn spawn(self: Arc<Self>, dirs: Vec<PathBuf>, files: Vec<PathBuf>) -> Result<TodoReport> {
        tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let (items, files_scanned) = self.process(&dirs, &files);
            TodoReport {
                items,
                elapsed: start.elapsed(),
                files_scanned,
            }
        })
        .await
        .map_err(|e| ReviewError::Background(e.to_string()))
    }

    fn weight_of(&self, name: &str) -> i64 {
        self.patterns
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.weight)
            .unwrap_or(i64::MAX)
    }

    /// Items grouped by pattern: weight, then name, then priority within
    /// each group.
    pub fn sorted_groups<'a>(&self, items: &'a [TodoItem]) -> Vec<(String, Vec<&'a TodoItem>)> {
        let mut sorted: Vec<&TodoItem> = items.iter().collect();
        sorted.sort_by(|a, b| {
            (self.weight_of(&a.pattern), &a.pattern, a.priority)
                .cmp(&(self.weight_of(&b.pattern), &b.pattern, b.priority))
        });

        let mut groups: Vec<(String, Vec<&TodoItem>)> = Vec::new();
        for item in sorted {
            match groups.last_mut() {
                Some((name, members)) if *name == item.pattern => members.push(item),
                _ => groups.push((item.pattern.clone(), vec![item])),
            }
        }
        groups
    }
}

fn valid_strftime(format: &str) -> bool {
    !format.is_empty() && !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

fn display_file(item: &TodoItem, settings: &TodoRenderSettings, roots: &[PathBuf]) -> String {
    let name = item
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let shown = if !settings.include_folder {
        name
    } else if settings.folder_depth == 0 {
        roots
            .iter()
            .find_map(|root| item.file.strip_prefix(root).ok())
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|| item.file.to_string_lossy().replace('\\', "/"))
    } else {
        let folders: Vec<String> = item
            .file
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        let start = folders.len().saturating_sub(settings.folder_depth);
        let mut parts = folders[start..].to_vec();
        parts.push(name);
        parts.join("/").replace("//", "/")
    };
    format!("{}:{}", shown, item.line)
}

/// The plain text review: a `//` header line, then one numbered section per
/// pattern with notes aligned in a column.
pub fn render_report(
    engine: &TodoEngine,
    report: &TodoReport,
    settings: &TodoRenderSettings,
    roots: &[PathBuf],
    generated_at: DateTime<Local>,
) -> String {
    let header_format = if settings.header_format.is_empty() {
        DEFAULT_HEADER_FORMAT
    } else {
        settings.header_format.as_str()
    };
    let date_format = if valid_strftime(&settings.header_date) {
        settings.header_date.as_str()
    } else {
        warn!(format = %settings.header_date, "invalid header date format, using default");
        DEFAULT_HEADER_DATE
    };

    let mut out = format!(
        "// {}\n",
        header_format
            .replace("%d", &generated_at.format(date_format).to_string())
            .replace("%t", &format!("{:.2}", report.elapsed.as_secs_f64()))
            .replace("%c", &report.files_scanned.to_string())
    );

    // item paths went through the same resolution when they were collected
    let roots: Vec<PathBuf> = roots.iter().map(|root| engine.resolve(root)).collect();
    let roots = roots.as_slice();

    let largest = report
        .items
        .iter()
        .map(|item| display_file(item, settings, roots).chars().count())
        .max()
        .unwrap_or(0)
        .min(settings.maxspaces)
        + 6;

    for (pattern, items) in engine.sorted_groups(&report.items) {
        out.push_str(&format!("\n## {} ({})\n", pattern.to_uppercase(), items.len()));
        for (index, item) in items.iter().enumerate() {
            let line = format!("{}. {}", index + 1, display_file(item, settings, roots));
            let pad = largest.saturating_sub(line.chars().count()).max(1);
            out.push_str(&format!("{}{}{}\n", line, " ".repeat(pad), item.note));
        }
    }
    out
}
