use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::AppError;
use crate::models::task::{Task, TaskKind};

type InFlight = Arc<Mutex<HashSet<PathBuf>>>;

fn lock(set: &InFlight) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Producer half of one FIFO task queue. Cheap to clone; the queue closes
/// once every clone is dropped.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    kind: TaskKind,
    tx: mpsc::UnboundedSender<Task>,
    in_flight: InFlight,
}

impl TaskQueue {
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Returns `Ok(false)` when the path already has a pending or running
    /// task on this queue.
    pub fn enqueue(&self, path: PathBuf) -> Result<bool, AppError> {
        self.push(Task::new(path, self.kind))
    }

    fn push(&self, task: Task) -> Result<bool, AppError> {
        let path = task.path.clone();
        if !lock(&self.in_flight).insert(path.clone()) {
            return Ok(false);
        }
        if self.tx.send(task).is_err() {
            lock(&self.in_flight).remove(&path);
            return Err(AppError::QueueClosed(self.kind.to_string()));
        }
        Ok(true)
    }
}

#[derive(Debug)]
pub struct TaskReceiver {
    kind: TaskKind,
    rx: mpsc::UnboundedReceiver<Task>,
    in_flight: InFlight,
}

impl TaskReceiver {
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Waits for the next task; `None` once the queue is closed and drained.
    pub async fn next(&mut self) -> Option<ClaimedTask> {
        let task = self.rx.recv().await?;
        Some(ClaimedTask {
            task,
            in_flight: self.in_flight.clone(),
        })
    }
}

/// A task held by a worker. Dropping it lets the same path be queued again.
#[derive(Debug)]
pub struct ClaimedTask {
    task: Task,
    in_flight: InFlight,
}

impl std::ops::Deref for ClaimedTask {
    type Target = Task;

    fn deref(&self) -> &Task {
        &self.task
    }
}

impl Drop for ClaimedTask {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.task.path);
    }
}

pub fn task_queue(kind: TaskKind) -> (TaskQueue, TaskReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let in_flight: InFlight = Arc::new(Mutex::new(HashSet::new()));
    (
        TaskQueue {
            kind,
            tx,
            in_flight: in_flight.clone(),
        },
        TaskReceiver { kind, rx, in_flight },
    )
}

/// The Sort and Rename streams. Producers hold this; workers hold the
/// matching [`QueueReceivers`].
#[derive(Debug, Clone)]
pub struct IngestionQueues {
    pub sort: TaskQueue,
    pub rename: TaskQueue,
}

#[derive(Debug)]
pub struct QueueReceivers {
    pub sort: TaskReceiver,
    pub rename: TaskReceiver,
}

impl IngestionQueues {
    pub fn new() -> (Self, QueueReceivers) {
        let (sort, sort_rx) = task_queue(TaskKind::Sort);
        let (rename, rename_rx) = task_queue(TaskKind::Rename);
        (
            Self { sort, rename },
            QueueReceivers {
                sort: sort_rx,
                rename: rename_rx,
            },
        )
    }

    pub fn queue(&self, kind: TaskKind) -> &TaskQueue {
        match kind {
            TaskKind::Sort => &self.sort,
            TaskKind::Rename => &self.rename,
        }
    }

    pub fn enqueue(&self, kind: TaskKind, path: PathBuf) -> Result<bool, AppError> {
        self.queue(kind).enqueue(path)
    }

    /// Queues an already built task on the queue matching its kind.
    pub fn submit(&self, task: Task) -> Result<bool, AppError> {
        self.queue(task.kind).push(task)
    }
}
