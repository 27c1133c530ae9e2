use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::placement::{PlacementResult, RenameTally};
use crate::models::task::ExtractionResult;
use crate::services::activity_log::ActivityLog;
use crate::services::dispatch_service::ResultHandler;
use crate::services::naming_service::{finalize_accepted_name, propose_name};
use crate::services::operator_service::{NameDecision, Operator};
use crate::services::placement_service;

/// Name review followed by an in-place rename. Keeps a running count of
/// successful renames for the batch summary.
pub struct RenameFlow {
    extension: String,
    operator: Arc<dyn Operator>,
    log: Arc<ActivityLog>,
    renamed: AtomicUsize,
}

impl RenameFlow {
    pub fn new(extension: impl Into<String>, operator: Arc<dyn Operator>, log: Arc<ActivityLog>) -> Self {
        Self {
            extension: extension.into(),
            operator,
            log,
            renamed: AtomicUsize::new(0),
        }
    }

    pub fn renamed(&self) -> usize {
        self.renamed.load(Ordering::SeqCst)
    }

    /// Everything that was submitted but not renamed counts as skipped,
    /// extraction failures included.
    pub fn tally(&self, total: usize) -> RenameTally {
        let renamed = self.renamed().min(total);
        RenameTally {
            renamed,
            skipped: total - renamed,
            total,
        }
    }

    pub async fn run(&self, result: &ExtractionResult) -> PlacementResult {
        let source = result.path.clone();
        let old_name = result.file_name();

        let proposal = propose_name(&source, &result.metadata, &self.extension);
        let accepted = match self.operator.review_name(&proposal).await {
            NameDecision::Accept(input) => finalize_accepted_name(&input, &self.extension),
            NameDecision::Skip => None,
        };
        let Some(new_name) = accepted else {
            self.log
                .info(format!("User skipped '{old_name}' at name proposal stage."));
            return PlacementResult::abandoned(source);
        };

        if new_name == old_name {
            self.log
                .info(format!("'{old_name}' already has the proposed name."));
            return PlacementResult::abandoned(source);
        }

        let src = source.clone();
        let target_name = new_name.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            placement_service::rename_in_place(&src, &target_name)
        })
        .await
        .unwrap_or_else(|e| Err(AppError::General(e.to_string())));

        match outcome {
            Ok(final_path) => {
                self.renamed.fetch_add(1, Ordering::SeqCst);
                self.log
                    .info(format!("Renamed (AI Naming): {old_name} -> {new_name}"));
                PlacementResult::moved(source, final_path)
            }
            Err(AppError::Conflict(_)) => {
                self.log.info(format!(
                    "Skipped renaming '{old_name}' because '{new_name}' already exists."
                ));
                PlacementResult::abandoned(source)
            }
            Err(e) => {
                self.log
                    .error(format!("Failed to rename {old_name}: {e}"));
                PlacementResult::failed(source)
            }
        }
    }
}

#[async_trait]
impl ResultHandler for RenameFlow {
    async fn handle(&self, result: ExtractionResult) -> PlacementResult {
        self.run(&result).await
    }
}
