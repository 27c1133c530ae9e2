use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::commands::pipeline::{start_pipeline, Pipeline};
use crate::error::AppError;
use crate::models::placement::RenameTally;
use crate::models::task::{display_name, TaskKind};
use crate::services::activity_log::ActivityLog;
use crate::services::dispatch_service::POLL_INTERVAL;
use crate::services::extraction_service::MetadataExtractor;
use crate::services::naming_service::has_extension;
use crate::services::operator_service::Operator;
use crate::services::watch_service::scan_existing;
use crate::state::AppState;

/// Expands folders (one level) and keeps documents, in argument order,
/// without repeats. Anything else is logged and left out.
pub fn collect_documents(inputs: &[PathBuf], extension: &str, log: &ActivityLog) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut documents = Vec::new();

    for input in inputs {
        let found = if input.is_dir() {
            match scan_existing(input, extension) {
                Ok(found) => found,
                Err(e) => {
                    log.error(format!("Could not read folder {}: {e}", input.display()));
                    continue;
                }
            }
        } else if input.is_file() && has_extension(&display_name(input), extension) {
            vec![input.clone()]
        } else {
            log.warn(format!("Ignoring '{}': not a PDF file.", input.display()));
            continue;
        };

        for path in found {
            if seen.insert(path.clone()) {
                documents.push(path);
            }
        }
    }
    documents
}

/// Runs a batch through the Rename queue and waits until every file has
/// been dealt with.
pub async fn run_rename_batch(
    state: &AppState,
    inputs: &[PathBuf],
    extractor: Arc<dyn MetadataExtractor>,
    operator: Arc<dyn Operator>,
) -> Result<RenameTally, AppError> {
    let documents = collect_documents(inputs, state.extension(), &state.log);
    if documents.is_empty() {
        state.log.info("No PDF files found for renaming.");
        return Ok(RenameTally::default());
    }

    let Pipeline {
        queues,
        dispatcher,
        rename_flow,
        workers,
    } = start_pipeline(state, extractor, operator);

    let mut total = 0;
    for path in documents {
        if queues.enqueue(TaskKind::Rename, path)? {
            total += 1;
        }
    }
    // Closing the queues lets the workers finish, which closes the results
    // channel and ends the dispatcher.
    drop(queues);

    dispatcher.run(POLL_INTERVAL, std::future::pending()).await;
    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!("rename worker failed: {e}");
        }
    }

    let tally = rename_flow.tally(total);
    state.log.info(format!(
        "Rename process finished. {} renamed, {} skipped, {} total.",
        tally.renamed, tally.skipped, tally.total
    ));
    Ok(tally)
}
