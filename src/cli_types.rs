use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "todoreview", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// List every processed and skipped file
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Project configuration file (defaults to ./todoreview.toml)
    #[arg(short, long, global = true, env = "TODOREVIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base directory for relative paths
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the by-object and by-version changelogs from SQL object files
    Changelog(ChangelogArgs),
    /// Stamp a file with the next build number and archive the copy
    Version(VersionArgs),
    /// List TODO/FIXME annotations
    Todo(TodoArgs),
    /// Print the effective configuration
    Config,
    /// Write a default configuration file
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ChangelogArgs {
    /// Source directories; replaces `changelog.source_paths`
    #[arg(short, long = "source")]
    pub sources: Vec<PathBuf>,

    /// Output directory; replaces `changelog.output_path`
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct VersionArgs {
    /// File to version
    pub file: PathBuf,

    /// Use this build number instead of the next computed one
    #[arg(short, long)]
    pub build: Option<u32>,

    /// Leave the source file untouched
    #[arg(long)]
    pub no_write_back: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TodoArgs {
    /// Files or directories to scan (defaults to the project directory)
    pub paths: Vec<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct InitConfigArgs {
    /// Where to write the file (defaults to ./todoreview.toml)
    pub path: Option<PathBuf>,
}
