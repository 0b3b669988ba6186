use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use todoreview::cli_types::{Cli, Commands};
use todoreview::{CliApp, CliConfig};

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "todoreview=debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = CliConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(project) = cli.project {
        config.scanning.project_path = Some(project);
    }

    let app = CliApp::new(config, cli.verbose, !cli.no_color).await?;

    match cli.command {
        Commands::Changelog(args) => app.changelog(args).await,
        Commands::Version(args) => app.version(args).await,
        Commands::Todo(args) => app.todo(args).await,
        Commands::Config => app.show_config().await,
        Commands::InitConfig(args) => app.init_config(args).await,
    }
}
