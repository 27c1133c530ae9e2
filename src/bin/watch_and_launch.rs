use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use paper_sorter_lib::commands::supervisor_commands::{build_supervisor, run_supervisor};
use paper_sorter_lib::config::{locate_config, AppConfig};
use paper_sorter_lib::services::launch_service::ProcessLauncher;

/// Starts paper-sorter whenever a PDF lands in the watch folder and it is
/// not already running.
#[derive(Parser, Debug)]
#[command(name = "watch-and-launch")]
#[command(version)]
struct Args {
    /// Path to config.json
    #[arg(short, long, env = "PAPER_SORTER_CONFIG")]
    config: Option<PathBuf>,

    /// paper-sorter executable to start; defaults to the one next to this
    /// binary
    #[arg(long)]
    app: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    paper_sorter_lib::init_tracing();
    let args = Args::parse();

    let config_path = locate_config(args.config)?;
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let supervisor_exe = std::env::current_exe().context("cannot locate this executable")?;
    let launcher = ProcessLauncher::from_config(&config, &config_path, args.app, &supervisor_exe)?;
    tracing::info!(
        program = %launcher.program().display(),
        "will start the sorter on new drops"
    );

    run_supervisor(
        &config,
        build_supervisor(Box::new(launcher)),
        paper_sorter_lib::shutdown_signal(),
    )
    .await?;
    Ok(())
}
