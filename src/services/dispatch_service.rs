use std::collections::HashMap;
use std::future::Future;
use std::pin::{pin, Pin};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TryRecvError;

use crate::models::placement::PlacementResult;
use crate::models::task::{ExtractionResult, TaskKind};
use crate::services::activity_log::ActivityLog;
use crate::services::worker_service::ResultReceiver;

pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Interactive handling for one kind of extraction result.
#[async_trait]
pub trait ResultHandler: Send + Sync {
    async fn handle(&self, result: ExtractionResult) -> PlacementResult;
}

#[derive(Debug, Default)]
pub struct DrainReport {
    pub handled: Vec<PlacementResult>,
    /// Every producer is gone and nothing is left to read.
    pub closed: bool,
    /// Shutdown arrived while a result was being handled.
    pub interrupted: bool,
}

/// Moves results from worker threads into the interactive context, one at a
/// time, routing each through the handler registered for its kind.
pub struct ResultDispatcher {
    results: ResultReceiver,
    handlers: HashMap<TaskKind, Arc<dyn ResultHandler>>,
    log: Arc<ActivityLog>,
}

impl ResultDispatcher {
    pub fn new(results: ResultReceiver, log: Arc<ActivityLog>) -> Self {
        Self {
            results,
            handlers: HashMap::new(),
            log,
        }
    }

    pub fn register(&mut self, kind: TaskKind, handler: Arc<dyn ResultHandler>) -> &mut Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Handles everything currently available without waiting for more.
    pub async fn drain(&mut self) -> DrainReport {
        self.drain_until(pin!(std::future::pending::<()>())).await
    }

    /// Like [`drain`](Self::drain), but abandons the result in hand as soon
    /// as `shutdown` resolves; its file is left where it is.
    pub async fn drain_until<F>(&mut self, mut shutdown: Pin<&mut F>) -> DrainReport
    where
        F: Future<Output = ()>,
    {
        let mut report = DrainReport::default();
        loop {
            let result = match self.results.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    report.closed = true;
                    break;
                }
            };
            let name = result.file_name();
            let outcome = tokio::select! {
                placed = self.dispatch(result) => Some(placed),
                _ = shutdown.as_mut() => None,
            };
            match outcome {
                Some(Some(placed)) => report.handled.push(placed),
                Some(None) => {}
                None => {
                    self.log
                        .info(format!("Shutdown requested; leaving '{name}' in place."));
                    report.interrupted = true;
                    break;
                }
            }
        }
        report
    }

    async fn dispatch(&self, result: ExtractionResult) -> Option<PlacementResult> {
        let Some(handler) = self.handlers.get(&result.kind) else {
            self.log.error(format!(
                "No handler for {} results; dropping {}.",
                result.kind,
                result.file_name()
            ));
            return None;
        };
        Some(handler.handle(result).await)
    }

    /// Polls every `interval` until `shutdown` resolves or the channel is
    /// closed and empty. Returns how many results were handled.
    pub async fn run<F>(mut self, interval: Duration, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        for kind in TaskKind::ALL {
            if !self.handlers.contains_key(&kind) {
                tracing::warn!(%kind, "no handler registered");
            }
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut shutdown = pin!(shutdown);

        let mut handled = 0usize;
        loop {
            tokio::select! {
                _ = shutdown.as_mut() => break,
                _ = ticker.tick() => {}
            }
            let report = self.drain_until(shutdown.as_mut()).await;
            handled += report.handled.len();
            if report.closed || report.interrupted {
                break;
            }
        }
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use crate::models::metadata::ExtractedMetadata;
    use crate::services::worker_service::result_channel;

    struct Recorder {
        label: &'static str,
        seen: Arc<Mutex<Vec<(&'static str, PathBuf)>>>,
    }

    #[async_trait]
    impl ResultHandler for Recorder {
        async fn handle(&self, result: ExtractionResult) -> PlacementResult {
            self.seen.lock().unwrap().push((self.label, result.path.clone()));
            PlacementResult::abandoned(result.path)
        }
    }

    fn result(kind: TaskKind, path: &str) -> ExtractionResult {
        ExtractionResult {
            kind,
            path: PathBuf::from(path),
            metadata: ExtractedMetadata::default(),
        }
    }

    fn log() -> (tempfile::TempDir, Arc<ActivityLog>) {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(ActivityLog::open(&dir.path().join("log.txt")).unwrap());
        (dir, log)
    }

    #[tokio::test]
    async fn routes_by_kind_and_drains_everything_available() {
        let (_dir, log) = log();
        let (tx, rx) = result_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut dispatcher = ResultDispatcher::new(rx, log);
        dispatcher
            .register(TaskKind::Sort, Arc::new(Recorder { label: "sort", seen: seen.clone() }))
            .register(TaskKind::Rename, Arc::new(Recorder { label: "rename", seen: seen.clone() }));

        tx.send(result(TaskKind::Sort, "a.pdf")).unwrap();
        tx.send(result(TaskKind::Rename, "b.pdf")).unwrap();
        tx.send(result(TaskKind::Sort, "c.pdf")).unwrap();

        let report = dispatcher.drain().await;
        assert_eq!(report.handled.len(), 3);
        assert!(!report.closed);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("sort", PathBuf::from("a.pdf")),
                ("rename", PathBuf::from("b.pdf")),
                ("sort", PathBuf::from("c.pdf")),
            ]
        );

        let empty = dispatcher.drain().await;
        assert!(empty.handled.is_empty());
        assert!(!empty.closed);

        drop(tx);
        assert!(dispatcher.drain().await.closed);
    }

    #[tokio::test]
    async fn unregistered_kind_is_logged_and_dropped() {
        let (_dir, log) = log();
        let (tx, rx) = result_channel();
        let mut dispatcher = ResultDispatcher::new(rx, log.clone());

        tx.send(result(TaskKind::Rename, "orphan.pdf")).unwrap();
        let report = dispatcher.drain().await;

        assert!(report.handled.is_empty());
        assert!(log
            .read_to_string()
            .unwrap()
            .contains("No handler for rename results; dropping orphan.pdf."));
    }

    #[tokio::test]
    async fn run_stops_when_producers_are_gone() {
        let (_dir, log) = log();
        let (tx, rx) = result_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = ResultDispatcher::new(rx, log);
        dispatcher.register(TaskKind::Sort, Arc::new(Recorder { label: "sort", seen: seen.clone() }));

        let producer = tokio::spawn(async move {
            for name in ["a.pdf", "b.pdf"] {
                tokio::time::sleep(Duration::from_millis(20)).await;
                tx.send(result(TaskKind::Sort, name)).unwrap();
            }
        });

        let handled = dispatcher
            .run(Duration::from_millis(10), std::future::pending())
            .await;
        producer.await.unwrap();

        assert_eq!(handled, 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (_dir, log) = log();
        let (_tx, rx) = result_channel();
        let dispatcher = ResultDispatcher::new(rx, log);

        let handled = dispatcher
            .run(
                Duration::from_millis(10),
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await;
        assert_eq!(handled, 0);
    }

    struct Hung;

    #[async_trait]
    impl ResultHandler for Hung {
        async fn handle(&self, _result: ExtractionResult) -> PlacementResult {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_interrupts_an_open_question() {
        let (_dir, log) = log();
        let (tx, rx) = result_channel();
        let mut dispatcher = ResultDispatcher::new(rx, log.clone());
        dispatcher.register(TaskKind::Sort, Arc::new(Hung));

        tx.send(result(TaskKind::Sort, "waiting.pdf")).unwrap();
        tx.send(result(TaskKind::Sort, "later.pdf")).unwrap();

        let handled = tokio::time::timeout(
            Duration::from_secs(2),
            dispatcher.run(
                Duration::from_millis(10),
                tokio::time::sleep(Duration::from_millis(100)),
            ),
        )
        .await
        .expect("run should return once shutdown resolves");

        assert_eq!(handled, 0);
        assert!(log
            .read_to_string()
            .unwrap()
            .contains("Shutdown requested; leaving 'waiting.pdf' in place."));
    }
}
