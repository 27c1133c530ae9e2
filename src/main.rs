use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use paper_sorter_lib::commands::add_commands::add_papers;
use paper_sorter_lib::commands::rename_commands::run_rename_batch;
use paper_sorter_lib::commands::sort_commands::run_sorter;
use paper_sorter_lib::commands::terminal_desk::spawn_terminal_desk;
use paper_sorter_lib::config::{api_key_from_env, locate_config};
use paper_sorter_lib::error::AppError;
use paper_sorter_lib::services::extraction_service::GeminiExtractor;
use paper_sorter_lib::services::instance_service::default_lock_path;
use paper_sorter_lib::services::operator_service::decision_channel;
use paper_sorter_lib::services::stability_service::StabilityPolicy;
use paper_sorter_lib::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "paper-sorter")]
#[command(about = "Names and files research papers dropped into a watch folder")]
#[command(version)]
struct Args {
    /// Path to config.json
    #[arg(short, long, env = "PAPER_SORTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the drop folder and sort what arrives (default)
    Run,
    /// Propose names for existing papers and rename them where they are
    Rename {
        /// PDF files or folders containing them
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Copy papers into the drop folder
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn extractor(state: &AppState) -> Result<Arc<GeminiExtractor>> {
    let api_key = api_key_from_env().context("FATAL: cannot call the extraction service")?;
    Ok(Arc::new(GeminiExtractor::new(
        api_key,
        state.config.model.clone(),
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    paper_sorter_lib::init_tracing();
    let args = Args::parse();

    let config_path = locate_config(args.config)?;
    let state = AppState::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    tracing::info!(config = %config_path.display(), "configuration loaded");

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            let extractor = extractor(&state)?;
            let (operator, requests) = decision_channel();
            spawn_terminal_desk(requests).context("failed to start operator desk")?;

            match run_sorter(
                &state,
                &default_lock_path(),
                StabilityPolicy::sorter(),
                extractor,
                Arc::new(operator),
                paper_sorter_lib::shutdown_signal(),
            )
            .await
            {
                Ok(handled) => tracing::info!(handled, "sorter stopped"),
                Err(AppError::AlreadyRunning(pid)) => {
                    tracing::info!(pid, "paper sorter is already running");
                }
                Err(e) => return Err(e).context("sorter failed"),
            }
        }
        Command::Rename { paths } => {
            let extractor = extractor(&state)?;
            let (operator, requests) = decision_channel();
            spawn_terminal_desk(requests).context("failed to start operator desk")?;

            let tally = run_rename_batch(&state, &paths, extractor, Arc::new(operator)).await?;
            println!(
                "{} renamed, {} skipped, {} total.",
                tally.renamed, tally.skipped, tally.total
            );
        }
        Command::Add { files } => {
            let added = add_papers(&state, &files);
            for path in &added {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}
