//! Markdown changelogs built from the object and version indices.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, ReviewError};
use crate::patterns::version_entries;
use crate::storage::{ObjectIndex, VersionIndex};
use crate::types::{BUILD_UNKNOWN, MAJOR_UNKNOWN, MINOR_UNKNOWN};

pub const BY_OBJECT_FILE: &str = "changelog_by_object.md";
pub const BY_VERSION_FILE: &str = "changelog_by_version.md";

/// Pipe-delimited table with a dash separator row.
struct Table {
    lines: Vec<String>,
}

impl Table {
    fn new(headers: &[&str]) -> Self {
        let separator = vec!["---"; headers.len()];
        Self {
            lines: vec![Self::row_line(headers), Self::row_line(&separator)],
        }
    }

    fn row(&mut self, cells: &[&str]) {
        let escaped: Vec<String> = cells.iter().map(|c| c.replace('|', "\\|")).collect();
        let refs: Vec<&str> = escaped.iter().map(String::as_str).collect();
        self.lines.push(Self::row_line(&refs));
    }

    fn row_line(cells: &[&str]) -> String {
        format!("| {} |", cells.join(" | "))
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }
}

fn document(blocks: Vec<String>) -> String {
    let mut out = blocks.join("\n\n");
    out.push('\n');
    out
}

/// Type label, then schema, then object name, all ascending. Each object
/// gets a table of its version lines in the order they appear in the file.
pub fn render_by_object(objects: &ObjectIndex) -> String {
    let mut blocks = vec!["# Changelog by object".to_string()];

    for (type_label, schemas) in objects.grouped() {
        blocks.push(format!("## {}", type_label));
        for (schema, records) in schemas {
            blocks.push(format!("### {}", schema));
            for record in records {
                blocks.push(format!("#### {}", record.key.name));

                let mut table = Table::new(&["Date", "Version", "Comments", "Author"]);
                for raw in version_entries(&record.raw_version_block) {
                    // raw integers here, -1 included
                    let version = raw.parsed_version().raw_string();
                    table.row(&[raw.date.trim(), version.as_str(), raw.comment.trim(), raw.author.trim()]);
                }
                blocks.push(table.finish());
            }
        }
    }

    document(blocks)
}

/// Major, minor and build descending, unknown components last and labelled.
pub fn render_by_version(versions: &VersionIndex) -> String {
    let mut blocks = vec!["# Changelog by version".to_string()];

    for (major, minors) in versions.majors_descending() {
        let major_label = major.label(MAJOR_UNKNOWN);
        blocks.push(format!("## {}", major_label));

        for (minor, builds) in minors.iter().rev() {
            let minor_label = minor.label(MINOR_UNKNOWN);
            blocks.push(format!("### {}.{}", major_label, minor_label));

            let mut table = Table::new(&["Version", "Comment", "File", "Author", "Date"]);
            for (build, record) in builds.iter().rev() {
                let version = format!(
                    "{}.{}.{}",
                    major_label,
                    minor_label,
                    build.label(BUILD_UNKNOWN)
                );
                let comment = record.comment();
                table.row(&[
                    version.as_str(),
                    comment.as_str(),
                    record.file(),
                    record.author(),
                    record.date(),
                ]);
            }
            blocks.push(table.finish());
        }
    }

    document(blocks)
}

#[derive(Debug, Clone)]
pub struct ChangelogPaths {
    pub by_object: PathBuf,
    pub by_version: PathBuf,
}

/// Render both documents into `out_dir`, replacing any previous content.
pub fn write_changelogs(
    objects: &ObjectIndex,
    versions: &VersionIndex,
    out_dir: &Path,
    by_object_name: &str,
    by_version_name: &str,
) -> Result<ChangelogPaths> {
    fs::create_dir_all(out_dir).map_err(|e| ReviewError::io(out_dir, e))?;

    let by_object = out_dir.join(by_object_name);
    fs::write(&by_object, render_by_object(objects)).map_err(|e| ReviewError::io(&by_object, e))?;

    let by_version = out_dir.join(by_version_name);
    fs::write(&by_version, render_by_version(versions))
        .map_err(|e| ReviewError::io(&by_version, e))?;

    info!(
        by_object = %by_object.display(),
        by_version = %by_version.display(),
        "changelogs written"
    );
    Ok(ChangelogPaths {
        by_object,
        by_version,
    })
}
