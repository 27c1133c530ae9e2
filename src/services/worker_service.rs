use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::task::{ExtractionResult, Task};
use crate::services::activity_log::ActivityLog;
use crate::services::extraction_service::MetadataExtractor;
use crate::services::queue_service::TaskReceiver;

pub type ResultSender = mpsc::UnboundedSender<ExtractionResult>;
pub type ResultReceiver = mpsc::UnboundedReceiver<ExtractionResult>;

pub fn result_channel() -> (ResultSender, ResultReceiver) {
    mpsc::unbounded_channel()
}

/// One consumer loop for one queue. Ends when the queue closes; a hung
/// extraction only stalls this loop.
pub fn spawn_worker(
    mut receiver: TaskReceiver,
    extractor: Arc<dyn MetadataExtractor>,
    results: ResultSender,
    log: Arc<ActivityLog>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let kind = receiver.kind();
        tracing::debug!(%kind, "worker started");
        while let Some(claimed) = receiver.next().await {
            if !process_task(&claimed, extractor.as_ref(), &results, &log).await {
                tracing::debug!(%kind, path = %claimed.path.display(), "task dropped");
            }
        }
        tracing::debug!(%kind, "worker stopped, queue closed");
    })
}

/// Extracts one task and forwards the labeled result. Returns whether a
/// result was forwarded; failures are logged and never retried.
pub async fn process_task(
    task: &Task,
    extractor: &dyn MetadataExtractor,
    results: &ResultSender,
    log: &ActivityLog,
) -> bool {
    let name = task.file_name();
    tracing::debug!(
        id = %task.id,
        kind = %task.kind,
        waited_ms = (Utc::now() - task.created_at).num_milliseconds(),
        "task picked up"
    );
    log.info(format!("--- Processing ({}): {name} ---", task.kind));

    match extractor.extract(&task.path).await {
        Ok(metadata) => {
            let result = ExtractionResult {
                kind: task.kind,
                path: task.path.clone(),
                metadata,
            };
            if results.send(result).is_err() {
                log.error(format!("Result channel closed; dropping {name}."));
                return false;
            }
            true
        }
        Err(e) => {
            if !e.is_extraction_failure() {
                tracing::warn!(%name, "extractor failed outside extraction: {e:?}");
            }
            log.error(format!("Could not get details for {name}: {e}"));
            false
        }
    }
}
