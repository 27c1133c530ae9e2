use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::metadata::ExtractedMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Sort,
    Rename,
}

impl TaskKind {
    pub const ALL: [TaskKind; 2] = [TaskKind::Sort, TaskKind::Rename];
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sort => write!(f, "sort"),
            Self::Rename => write!(f, "rename"),
        }
    }
}

/// A qualifying file-system notification, before the stability check.
#[derive(Debug, Clone)]
pub struct DropEvent {
    pub path: PathBuf,
    pub detected_at: DateTime<Utc>,
}

impl DropEvent {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            detected_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: uuid::Uuid,
    pub path: PathBuf,
    pub kind: TaskKind,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(path: PathBuf, kind: TaskKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            path,
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }
}

/// A task for a watched drop is dated from the notification, not from when
/// the file settled.
impl From<(DropEvent, TaskKind)> for Task {
    fn from((event, kind): (DropEvent, TaskKind)) -> Self {
        Self {
            created_at: event.detected_at,
            ..Self::new(event.path, kind)
        }
    }
}

/// Labeled output of a worker, handed across to the interactive context.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub kind: TaskKind,
    pub path: PathBuf,
    pub metadata: ExtractedMetadata,
}

impl ExtractionResult {
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
