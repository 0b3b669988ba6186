use anyhow::{bail, Context, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

use crate::{
    cli_types::{ChangelogArgs, InitConfigArgs, TodoArgs, VersionArgs},
    config::{user_config_path, CliConfig, CONFIG_FILE_NAME},
    renderer::write_changelogs,
    scanner::{CollectResult, ScanConfig, SkipReason, VersionCollector},
    todo::{render_report, TodoEngine},
    ui::UIManager,
};

pub struct CliApp {
    config: CliConfig,
    project_dir: PathBuf,
    verbose: bool,
    ui: UIManager,
}

impl CliApp {
    pub async fn new(config: CliConfig, verbose: bool, colors_enabled: bool) -> Result<Self> {
        info!("Initializing todoreview CLI");

        let ui = UIManager::new(colors_enabled && config.output.colors);
        let verbose = verbose || config.output.verbose;
        let project_dir = config.project_dir(None);
        if !project_dir.is_dir() {
            bail!("Project directory not found: {}", project_dir.display());
        }

        Ok(Self {
            config,
            project_dir,
            verbose,
            ui,
        })
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    pub async fn changelog(&self, args: ChangelogArgs) -> Result<()> {
        self.ui.print_header("Changelog");

        let sources = if args.sources.is_empty() {
            self.config.changelog.source_paths.clone()
        } else {
            args.sources
        };
        let output = self.resolve(args.output.as_ref().unwrap_or(&self.config.changelog.output_path));

        if self.verbose {
            self.ui.print_info(&format!("Project: {}", self.project_dir.display()));
            self.ui.print_path_list("Sources", &sources);
            self.ui.print_info(&format!("Output: {}", output.display()));
        }

        let collector = VersionCollector::new(
            &self.project_dir,
            ScanConfig {
                follow_symlinks: self.config.scanning.follow_symlinks,
                max_depth: self.config.scanning.max_depth,
            },
        );

        let spinner = self.ui.create_spinner("Collecting versions...");
        let report = collector
            .spawn(sources)
            .await
            .context("Version collection failed")?;
        spinner.finish_and_clear();

        if self.verbose {
            self.print_collect_details(&report.result);
        }

        let metadata = report.result.versions.get_metadata();
        if report.result.objects.is_empty() {
            self.ui.print_warning("No versioned object files found");
        }

        let paths = write_changelogs(
            &report.result.objects,
            &report.result.versions,
            &output,
            &self.config.changelog.by_object_file,
            &self.config.changelog.by_version_file,
        )
        .with_context(|| format!("Failed to write changelogs to {}", output.display()))?;

        self.ui.print_info(&format!(
            "{} files scanned, {} objects, {} version entries in {} builds ({} merged, {} unknown) in {:.2}s",
            report.files_scanned,
            report.result.objects.len(),
            metadata.total_entries,
            metadata.total_builds,
            metadata.collisions,
            metadata.unknown_versions,
            report.elapsed.as_secs_f64()
        ));
        self.ui.print_success(&format!("Wrote {}", paths.by_object.display()));
        self.ui.print_success(&format!("Wrote {}", paths.by_version.display()));

        Ok(())
    }

    fn print_collect_details(&self, result: &CollectResult) {
        self.ui.print_path_list("Processed", &result.processed);
        if !result.skipped.is_empty() {
            let lines: Vec<String> = result
                .skipped
                .iter()
                .map(|s| match &s.reason {
                    SkipReason::NameMismatch => format!("{} (not an object file)", s.path.display()),
                    SkipReason::Unreadable(e) => format!("{} ({})", s.path.display(), e),
                })
                .collect();
            self.ui.print_path_list("Skipped", &lines);
        }
    }

    pub async fn version(&self, args: VersionArgs) -> Result<()> {
        self.ui.print_header("Version");

        let mut settings = self.config.versioning.clone();
        if args.no_write_back {
            settings.write_back = false;
        }

        let versioning = match settings.validate(&self.project_dir) {
            Ok(versioning) => versioning,
            Err(e) => {
                self.ui.print_error_with_suggestions(
                    &e.to_string(),
                    Some("Set them in the [versioning] section of todoreview.toml"),
                );
                return Err(e).context("Versioning is not configured");
            }
        };

        if !args.file.is_file() {
            self.ui.print_error(&format!("File not found: {}", args.file.display()));
            bail!("Cannot version {}", args.file.display());
        }

        let plan = versioning
            .plan(&args.file)
            .with_context(|| format!("Failed to read archive folder {}", versioning.archive_dir.display()))?;

        if self.verbose {
            self.ui.print_info(&format!("Archive folder: {}", versioning.archive_dir.display()));
            self.ui.print_info(&format!("Existing builds: {:?}", plan.existing_builds));
        }

        let build = match args.build {
            Some(build) => build,
            None if versioning.confirm => {
                self.prompt_build(&versioning.version_string(plan.build), plan.build)
                    .await?
            }
            None => plan.build,
        };

        match versioning.archive(&plan, build) {
            Ok(outcome) => {
                self.ui.print_success(&format!(
                    "Version {} archived to {}",
                    outcome.version,
                    outcome.archive_path.display()
                ));
                if outcome.wrote_back {
                    self.ui.print_info(&format!("Updated {}", plan.source.display()));
                }
                Ok(())
            }
            Err(e) => {
                self.ui.print_error(&e.to_string());
                Err(e).with_context(|| format!("Failed to version {}", args.file.display()))
            }
        }
    }

    async fn prompt_build(&self, suggested_version: &str, planned: u32) -> Result<u32> {
        print!("Build number for {} [{}]: ", suggested_version, planned);
        io::stdout().flush().context("Failed to flush stdout")?;

        read_build_answer(BufReader::new(tokio::io::stdin()), planned).await
    }

    pub async fn todo(&self, args: TodoArgs) -> Result<()> {
        let start_time = Instant::now();

        let paths = if !args.paths.is_empty() {
            args.paths.iter().map(|p| self.resolve(p)).collect()
        } else if !self.config.todo.include_paths.is_empty() {
            self.config.todo.include_paths.iter().map(|p| self.resolve(p)).collect()
        } else {
            vec![self.project_dir.clone()]
        };
        let (dirs, files): (Vec<PathBuf>, Vec<PathBuf>) = paths.into_iter().partition(|p| p.is_dir());

        let engine = Arc::new(TodoEngine::new(&self.config.todo).context("Invalid [todo] settings")?);

        let spinner = self.ui.create_spinner("Scanning for annotations...");
        let report = Arc::clone(&engine)
            .spawn(dirs.clone(), files)
            .await
            .context("Annotation scan failed")?;
        spinner.finish_and_clear();

        let text = render_report(
            &engine,
            &report,
            &self.config.todo.render,
            &dirs,
            chrono::Local::now(),
        );

        match &args.output {
            Some(output) => {
                let output = self.resolve(output);
                tokio::fs::write(&output, &text)
                    .await
                    .with_context(|| format!("Failed to write report to {}", output.display()))?;
                self.ui.print_success(&format!(
                    "{} annotations in {} files written to {}",
                    report.items.len(),
                    report.files_scanned,
                    output.display()
                ));
            }
            None => print!("{}", text),
        }

        if self.verbose {
            self.ui.print_info(&format!("Completed in {:?}", start_time.elapsed()));
        }
        Ok(())
    }

    pub async fn show_config(&self) -> Result<()> {
        self.ui.print_header("Configuration");

        let config_json = serde_json::to_string_pretty(&self.config)
            .context("Failed to serialize configuration")?;
        println!("{}", config_json);

        self.ui.print_info(&format!("Project directory: {}", self.project_dir.display()));
        match user_config_path() {
            Some(path) if path.exists() => self.ui.print_info(&format!("User config: {}", path.display())),
            Some(path) => self.ui.print_info(&format!("User config: {} (not present)", path.display())),
            None => self.ui.print_warning("No user config directory available"),
        }
        Ok(())
    }

    pub async fn init_config(&self, args: InitConfigArgs) -> Result<()> {
        let path = args
            .path
            .map(|p| self.resolve(&p))
            .unwrap_or_else(|| self.project_dir.join(CONFIG_FILE_NAME));

        CliConfig::write_default(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.ui.print_success(&format!("Created {}", path.display()));
        Ok(())
    }
}

async fn read_build_answer<R: AsyncBufRead + Unpin>(mut reader: R, planned: u32) -> Result<u32> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .context("Failed to read build number")?;
    parse_build_answer(&line, planned)
}

/// Empty input keeps the planned build.
fn parse_build_answer(answer: &str, planned: u32) -> Result<u32> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(planned);
    }
    answer
        .parse()
        .with_context(|| format!("Not a build number: {}", answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versioning::VersionSettings;
    use std::fs;
    use tempfile::TempDir;
    use tokio::test;

    const GET_USER: &str = "\
CREATE PROCEDURE dbo.GetUser AS
-- #region versions start
-- 2022-05-28 12:30:29 ann - (1.0.101) first cut
-- #endregion versions end
SELECT '{fileversion}'
";

    fn create_test_config(project: &Path) -> CliConfig {
        let mut config = CliConfig::default();
        config.scanning.project_path = Some(project.to_path_buf());
        config
    }

    fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file_path, content).unwrap();
        file_path
    }

    #[test]
    async fn test_cli_app_creation() {
        let dir = TempDir::new().unwrap();
        let app = CliApp::new(create_test_config(dir.path()), false, false).await;
        assert!(app.is_ok());
        assert_eq!(app.unwrap().project_dir(), dir.path());
    }

    #[test]
    async fn test_cli_app_rejects_missing_project() {
        let dir = TempDir::new().unwrap();
        let config = create_test_config(&dir.path().join("absent"));
        assert!(CliApp::new(config, false, false).await.is_err());
    }

    #[test]
    async fn test_changelog_writes_both_documents() {
        let dir = TempDir::new().unwrap();
        create_test_file(&dir, "db/usp.dbo.GetUser.sql", GET_USER);
        create_test_file(&dir, "db/readme.txt", "not an object");

        let app = CliApp::new(create_test_config(dir.path()), true, false).await.unwrap();
        app.changelog(ChangelogArgs {
            sources: vec![PathBuf::from("db")],
            output: Some(PathBuf::from("docs")),
        })
        .await
        .unwrap();

        let by_object = fs::read_to_string(dir.path().join("docs/changelog_by_object.md")).unwrap();
        assert!(by_object.contains("#### GetUser"));
        let by_version = fs::read_to_string(dir.path().join("docs/changelog_by_version.md")).unwrap();
        assert!(by_version.contains("| 1.0.101 | first cut | usp.dbo.GetUser.sql | ann |"));
    }

    #[test]
    async fn test_version_reports_missing_settings() {
        let dir = TempDir::new().unwrap();
        let file = create_test_file(&dir, "usp.dbo.GetUser.sql", GET_USER);

        let app = CliApp::new(create_test_config(dir.path()), false, false).await.unwrap();
        let err = app
            .version(VersionArgs {
                file,
                build: None,
                no_write_back: false,
            })
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("deployment_folder"));
    }

    #[test]
    async fn test_version_archives_and_refuses_repeat() {
        let dir = TempDir::new().unwrap();
        let file = create_test_file(&dir, "usp.dbo.GetUser.sql", GET_USER);

        let mut config = create_test_config(dir.path());
        config.versioning = VersionSettings {
            deployment_folder: Some(PathBuf::from("deploy")),
            prefix: Some("v".to_string()),
            suffix: Some("_".to_string()),
            major: Some(1),
            minor: Some(0),
            ..VersionSettings::default()
        };
        let app = CliApp::new(config, false, false).await.unwrap();

        let args = VersionArgs {
            file: file.clone(),
            build: None,
            no_write_back: true,
        };
        app.version(args.clone()).await.unwrap();

        let archived = dir.path().join("deploy/1/0/v1.0.101_usp.dbo.GetUser.sql");
        let text = fs::read_to_string(&archived).unwrap();
        assert!(text.starts_with("-- header: (1.0.101)\n"));
        assert!(text.contains("SELECT '1.0.101'"));
        // source untouched with --no-write-back
        assert_eq!(fs::read_to_string(&file).unwrap(), GET_USER);

        // next run picks the following build; forcing the old one is refused
        app.version(args.clone()).await.unwrap();
        assert!(dir.path().join("deploy/1/0/v1.0.104_usp.dbo.GetUser.sql").exists());

        let forced = VersionArgs {
            build: Some(101),
            ..args
        };
        assert!(app.version(forced).await.is_err());
    }

    #[test]
    async fn test_todo_writes_report() {
        let dir = TempDir::new().unwrap();
        create_test_file(&dir, "src/main.rs", "fn main() {}\n// TODO: handle args\n");

        let app = CliApp::new(create_test_config(dir.path()), false, false).await.unwrap();
        app.todo(TodoArgs {
            paths: vec![PathBuf::from("src")],
            output: Some(PathBuf::from("todo.txt")),
        })
        .await
        .unwrap();

        let report = fs::read_to_string(dir.path().join("todo.txt")).unwrap();
        assert!(report.starts_with("// "));
        assert!(report.contains("## TODO (1)"));
        assert!(report.contains("1. main.rs:2"));
        assert!(report.contains("handle args"));
    }

    #[test]
    async fn test_config_display() {
        let dir = TempDir::new().unwrap();
        let app = CliApp::new(create_test_config(dir.path()), false, false).await.unwrap();
        assert!(app.show_config().await.is_ok());
    }

    #[test]
    async fn test_init_config_creates_file_once() {
        let dir = TempDir::new().unwrap();
        let app = CliApp::new(create_test_config(dir.path()), false, false).await.unwrap();

        app.init_config(InitConfigArgs::default()).await.unwrap();
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
        assert!(app.init_config(InitConfigArgs::default()).await.is_err());
    }

    #[test]
    async fn test_read_build_answer_from_input() {
        assert_eq!(read_build_answer(&b"117\n"[..], 104).await.unwrap(), 117);
        assert_eq!(read_build_answer(&b"\n"[..], 104).await.unwrap(), 104);
        // closed input keeps the planned build
        assert_eq!(read_build_answer(&b""[..], 104).await.unwrap(), 104);
        assert!(read_build_answer(&b"soon\n"[..], 104).await.is_err());
    }

    #[test]
    async fn test_todo_defaults_to_include_paths() {
        let dir = TempDir::new().unwrap();
        create_test_file(&dir, "src/lib.rs", "// TODO: split module\n");
        create_test_file(&dir, "scripts/build.sh", "# TODO: drop this script\n");

        let mut config = create_test_config(dir.path());
        config.todo.include_paths = vec![PathBuf::from("src")];
        let app = CliApp::new(config, false, false).await.unwrap();
        app.todo(TodoArgs {
            paths: vec![],
            output: Some(PathBuf::from("todo.txt")),
        })
        .await
        .unwrap();

        let report = fs::read_to_string(dir.path().join("todo.txt")).unwrap();
        assert!(report.contains("## TODO (1)"));
        assert!(report.contains("split module"));
        assert!(!report.contains("drop this script"));
    }

    #[test]
    async fn test_parse_build_answer() {
        assert_eq!(parse_build_answer("\n", 104).unwrap(), 104);
        assert_eq!(parse_build_answer(" 120 \n", 104).unwrap(), 120);
        assert!(parse_build_answer("next", 104).is_err());
    }
}
