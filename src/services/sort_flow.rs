use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinError;

use crate::models::placement::{DestinationDecision, PlacementResult};
use crate::models::task::ExtractionResult;
use crate::services::activity_log::ActivityLog;
use crate::services::dispatch_service::ResultHandler;
use crate::services::folder_service::relative_display;
use crate::services::naming_service::{finalize_accepted_name, propose_name};
use crate::services::operator_service::{DuplicateDecision, NameDecision, Operator};
use crate::services::placement_service;

/// Where a sort task stands. Every non-terminal step either advances one
/// step or ends in `Done` with an abandoned result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortStep {
    ProposeName,
    DuplicateCheck { filename: String },
    ChooseDestination { filename: String },
    ConfirmMove(DestinationDecision),
    Place(DestinationDecision),
    Done(PlacementResult),
}

pub struct SortFlow {
    sorted_root: PathBuf,
    extension: String,
    operator: Arc<dyn Operator>,
    log: Arc<ActivityLog>,
}

impl SortFlow {
    pub fn new(
        sorted_root: PathBuf,
        extension: impl Into<String>,
        operator: Arc<dyn Operator>,
        log: Arc<ActivityLog>,
    ) -> Self {
        Self {
            sorted_root,
            extension: extension.into(),
            operator,
            log,
        }
    }

    pub async fn run(&self, result: &ExtractionResult) -> PlacementResult {
        let mut step = SortStep::ProposeName;
        loop {
            step = match step {
                SortStep::Done(placed) => return placed,
                other => self.advance(other, result).await,
            };
        }
    }

    pub async fn advance(&self, step: SortStep, result: &ExtractionResult) -> SortStep {
        let source = &result.path;
        let name = result.file_name();

        match step {
            SortStep::ProposeName => {
                let proposal = propose_name(source, &result.metadata, &self.extension);
                let accepted = match self.operator.review_name(&proposal).await {
                    NameDecision::Accept(input) => finalize_accepted_name(&input, &self.extension),
                    NameDecision::Skip => None,
                };
                match accepted {
                    Some(filename) => SortStep::DuplicateCheck { filename },
                    None => {
                        self.log
                            .info(format!("User skipped '{name}' at name proposal stage."));
                        SortStep::Done(PlacementResult::abandoned(source.clone()))
                    }
                }
            }
            SortStep::DuplicateCheck { filename } => {
                let stem = file_stem(&filename);
                let scan = self.find_duplicates(stem).await;
                let Some(matches) = self.scanned_or_logged(&name, scan) else {
                    return SortStep::Done(PlacementResult::failed(source.clone()));
                };
                if matches.is_empty() {
                    return SortStep::ChooseDestination { filename };
                }
                match self.operator.review_duplicate(&filename, &matches).await {
                    DuplicateDecision::Proceed => SortStep::ChooseDestination { filename },
                    DuplicateDecision::Skip => {
                        self.log
                            .warn(format!("DUPLICATE: User chose to skip '{name}'."));
                        SortStep::Done(PlacementResult::abandoned(source.clone()))
                    }
                }
            }
            SortStep::ChooseDestination { filename } => {
                match self
                    .operator
                    .choose_destination(&self.sorted_root, &filename)
                    .await
                {
                    Some(folder) => SortStep::ConfirmMove(DestinationDecision { folder, filename }),
                    None => {
                        self.log.info(format!(
                            "User canceled destination selection for '{name}'."
                        ));
                        SortStep::Done(PlacementResult::abandoned(source.clone()))
                    }
                }
            }
            SortStep::ConfirmMove(decision) => {
                if self.operator.confirm_move(&decision).await {
                    SortStep::Place(decision)
                } else {
                    self.log
                        .info(format!("User canceled final move for '{name}'."));
                    SortStep::Done(PlacementResult::abandoned(source.clone()))
                }
            }
            SortStep::Place(decision) => {
                SortStep::Done(self.place(source, &name, decision).await)
            }
            done @ SortStep::Done(_) => done,
        }
    }

    async fn find_duplicates(&self, stem: String) -> Result<Vec<PathBuf>, JoinError> {
        let root = self.sorted_root.clone();
        let extension = self.extension.clone();
        tokio::task::spawn_blocking(move || {
            placement_service::find_probable_duplicates(&root, &stem, &extension)
        })
        .await
    }

    /// A scan that never finished is not "no duplicates": the file stays put.
    fn scanned_or_logged(
        &self,
        name: &str,
        scan: Result<Vec<PathBuf>, JoinError>,
    ) -> Option<Vec<PathBuf>> {
        match scan {
            Ok(matches) => Some(matches),
            Err(e) => {
                self.log
                    .error(format!("Duplicate check failed for '{name}': {e}"));
                None
            }
        }
    }

    async fn place(&self, source: &Path, name: &str, decision: DestinationDecision) -> PlacementResult {
        let src = source.to_path_buf();
        let outcome = tokio::task::spawn_blocking(move || {
            placement_service::place(&src, &decision.folder, &decision.filename)
        })
        .await;

        match outcome {
            Ok(Ok(final_path)) => {
                self.log.info(format!(
                    "MOVED: '{name}' -> '{}'",
                    relative_display(&final_path, &self.sorted_root)
                ));
                PlacementResult::moved(source.to_path_buf(), final_path)
            }
            Ok(Err(e)) => {
                self.log.error(format!("Failed to move file: {e}"));
                PlacementResult::failed(source.to_path_buf())
            }
            Err(e) => {
                self.log.error(format!("Failed to move file: {e}"));
                PlacementResult::failed(source.to_path_buf())
            }
        }
    }
}

#[async_trait]
impl ResultHandler for SortFlow {
    async fn handle(&self, result: ExtractionResult) -> PlacementResult {
        self.run(&result).await
    }
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string())
}
