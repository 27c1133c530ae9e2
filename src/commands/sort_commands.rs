use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use crate::commands::pipeline::{start_pipeline, Pipeline};
use crate::error::AppError;
use crate::models::task::{display_name, Task, TaskKind};
use crate::services::activity_log::ActivityLog;
use crate::services::dispatch_service::POLL_INTERVAL;
use crate::services::extraction_service::MetadataExtractor;
use crate::services::instance_service::InstanceLock;
use crate::services::operator_service::Operator;
use crate::services::queue_service::IngestionQueues;
use crate::services::stability_service::StabilityPolicy;
use crate::services::watch_service::{self, WatchEvent, WatchOptions};
use crate::state::AppState;

/// Queues every document already waiting in the watch folder.
pub fn queue_existing_files(state: &AppState, queues: &IngestionQueues) -> Result<usize, AppError> {
    let watch_folder = &state.config.watch_folder;
    state
        .log
        .info(format!("Scanning for existing files in {}...", watch_folder.display()));

    let existing = watch_service::scan_existing(watch_folder, state.extension())?;
    if existing.is_empty() {
        state
            .log
            .info("No PDF files found; ToSort folder is empty.");
        return Ok(0);
    }

    state
        .log
        .info(format!("Found {} PDF(s) to queue for processing.", existing.len()));
    let mut queued = 0;
    for path in existing {
        if queues.enqueue(TaskKind::Sort, path)? {
            queued += 1;
        }
    }
    Ok(queued)
}

fn on_watch_event(event: WatchEvent, queues: &IngestionQueues, log: &ActivityLog) {
    match event {
        WatchEvent::Stable(event) => {
            let name = display_name(&event.path);
            match queues.submit(Task::from((event, TaskKind::Sort))) {
                Ok(true) => log.info(format!("New file detected: {name}")),
                Ok(false) => tracing::debug!(%name, "already queued"),
                Err(e) => log.error(format!("Could not queue {name}: {e}")),
            }
        }
        WatchEvent::Unstable(path) => {
            log.warn(format!(
                "'{}' did not settle in time; not processing it.",
                display_name(&path)
            ));
        }
    }
}

/// The main mode: hold the instance lock, process what is already waiting,
/// then watch for new drops until `shutdown` resolves. New drops wait out
/// `policy` before they are queued. Returns how many documents reached a
/// terminal state.
pub async fn run_sorter<F>(
    state: &AppState,
    lock_path: &Path,
    policy: StabilityPolicy,
    extractor: Arc<dyn MetadataExtractor>,
    operator: Arc<dyn Operator>,
    shutdown: F,
) -> Result<usize, AppError>
where
    F: Future<Output = ()>,
{
    let _lock = InstanceLock::acquire(lock_path)?;

    let Pipeline {
        queues,
        dispatcher,
        workers,
        ..
    } = start_pipeline(state, extractor, operator);

    queue_existing_files(state, &queues)?;

    let watch_queues = queues.clone();
    let watch_log = state.log.clone();
    let handle = watch_service::start_watching(
        &state.config.watch_folder,
        WatchOptions {
            extension: state.extension().to_string(),
            include_moves: false,
            policy,
        },
        Arc::new(move |event: WatchEvent| on_watch_event(event, &watch_queues, &watch_log)),
    )?;
    state.log.info(format!(
        "Watching for new files in: {}",
        handle.directory().display()
    ));

    let handled = dispatcher.run(POLL_INTERVAL, shutdown).await;

    state.log.info("--- Shutting down... ---");
    drop(handle);
    drop(queues);
    for worker in workers {
        // In-flight extractions are abandoned; their files stay put.
        worker.abort();
    }
    Ok(handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;

    use crate::models::metadata::ExtractedMetadata;
    use crate::services::sort_flow::tests::ScriptedOperator;
    use crate::state::tests::scratch_state;

    /// Doe/Nature/2021 for everything, except files named `broken.pdf`.
    struct FixedExtractor;

    #[async_trait]
    impl MetadataExtractor for FixedExtractor {
        async fn extract(&self, path: &Path) -> Result<ExtractedMetadata, AppError> {
            if path.ends_with("broken.pdf") {
                return Err(AppError::NoText(display_name(path)));
            }
            Ok(ExtractedMetadata {
                author: "Doe".to_string(),
                year: "2021".to_string(),
                journal: "Nature".to_string(),
                title: "X".to_string(),
                is_multiple_authors: false,
            })
        }
    }

    async fn until_exists(paths: Vec<PathBuf>, limit: Duration) {
        let start = Instant::now();
        while start.elapsed() < limit && !paths.iter().all(|p| p.exists()) {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    #[tokio::test]
    async fn existing_file_is_sorted_end_to_end() {
        let (dir, state) = scratch_state();
        let dropped = state.config.watch_folder.join("paper.pdf");
        fs::write(&dropped, "%PDF").unwrap();
        let target = state
            .config
            .sorted_folder
            .join("Folder A")
            .join("Doe_Nature_2021.pdf");

        let handled = run_sorter(
            &state,
            &dir.path().join("sorter.pid"),
            StabilityPolicy::sorter(),
            Arc::new(FixedExtractor),
            Arc::new(ScriptedOperator::accepting("Folder A")),
            until_exists(vec![target.clone()], Duration::from_secs(5)),
        )
        .await
        .unwrap();

        assert!(target.is_file());
        assert!(!dropped.exists());
        assert_eq!(handled, 1);
        let log = state.log.read_to_string().unwrap();
        assert!(log.contains("Found 1 PDF(s) to queue for processing."));
        assert!(log.contains("MOVED: 'paper.pdf' -> 'Folder A/Doe_Nature_2021.pdf'"));
        assert!(!dir.path().join("sorter.pid").exists());
    }

    #[tokio::test]
    async fn collision_in_destination_gets_suffix() {
        let (dir, state) = scratch_state();
        let folder = state.config.sorted_folder.join("Folder A");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("Doe_Nature_2021.pdf"), "older").unwrap();
        fs::write(state.config.watch_folder.join("paper.pdf"), "%PDF").unwrap();
        let suffixed = folder.join("Doe_Nature_2021-1.pdf");

        run_sorter(
            &state,
            &dir.path().join("sorter.pid"),
            StabilityPolicy::sorter(),
            Arc::new(FixedExtractor),
            Arc::new(ScriptedOperator::accepting("Folder A")),
            until_exists(vec![suffixed.clone()], Duration::from_secs(5)),
        )
        .await
        .unwrap();

        assert!(suffixed.is_file());
        assert_eq!(fs::read_to_string(folder.join("Doe_Nature_2021.pdf")).unwrap(), "older");
    }

    #[tokio::test]
    async fn extraction_failure_leaves_the_file_and_logs() {
        let (dir, state) = scratch_state();
        let broken = state.config.watch_folder.join("broken.pdf");
        fs::write(&broken, "%PDF").unwrap();
        let log_path = state.log.path().to_path_buf();

        let wait_for_error = async move {
            let start = Instant::now();
            while start.elapsed() < Duration::from_secs(5) {
                let content = fs::read_to_string(&log_path).unwrap_or_default();
                if content.contains("Could not get details for broken.pdf") {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        };

        let handled = run_sorter(
            &state,
            &dir.path().join("sorter.pid"),
            StabilityPolicy::sorter(),
            Arc::new(FixedExtractor),
            Arc::new(ScriptedOperator::accepting("Folder A")),
            wait_for_error,
        )
        .await
        .unwrap();

        assert_eq!(handled, 0);
        assert!(broken.exists());
        assert!(state
            .log
            .read_to_string()
            .unwrap()
            .contains("ERROR - Could not get details for broken.pdf"));
    }

    #[tokio::test]
    async fn empty_watch_folder_is_reported() {
        let (_dir, state) = scratch_state();
        let (queues, _receivers) = IngestionQueues::new();

        assert_eq!(queue_existing_files(&state, &queues).unwrap(), 0);
        assert!(state
            .log
            .read_to_string()
            .unwrap()
            .contains("No PDF files found; ToSort folder is empty."));
    }

    #[test]
    fn unstable_drop_is_logged_as_warning() {
        let (_dir, state) = scratch_state();
        let (queues, _receivers) = IngestionQueues::new();

        on_watch_event(
            WatchEvent::Unstable(state.config.watch_folder.join("big.pdf")),
            &queues,
            &state.log,
        );
        assert!(state
            .log
            .read_to_string()
            .unwrap()
            .contains("WARNING - 'big.pdf' did not settle in time; not processing it."));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn file_dropped_while_watching_is_sorted() {
        let (dir, state) = scratch_state();
        let dropped = state.config.watch_folder.join("paper.pdf");
        let target = state
            .config
            .sorted_folder
            .join("Folder A")
            .join("Doe_Nature_2021.pdf");
        let quick = StabilityPolicy {
            grace: Duration::ZERO,
            max_wait: Duration::from_secs(5),
            sample_interval: Duration::from_millis(50),
        };

        // Polled only once the watcher is subscribed.
        let drop_then_wait = {
            let dropped = dropped.clone();
            let target = target.clone();
            async move {
                fs::write(&dropped, "%PDF-1.4 dropped later").unwrap();
                until_exists(vec![target], Duration::from_secs(10)).await;
            }
        };

        let handled = run_sorter(
            &state,
            &dir.path().join("sorter.pid"),
            quick,
            Arc::new(FixedExtractor),
            Arc::new(ScriptedOperator::accepting("Folder A")),
            drop_then_wait,
        )
        .await
        .unwrap();

        assert_eq!(handled, 1);
        assert!(target.is_file());
        assert!(!dropped.exists());
        let log = state.log.read_to_string().unwrap();
        assert!(log.contains("No PDF files found; ToSort folder is empty."));
        assert!(log.contains("New file detected: paper.pdf"));
        assert!(log.contains("MOVED: 'paper.pdf' -> 'Folder A/Doe_Nature_2021.pdf'"));
    }
}
