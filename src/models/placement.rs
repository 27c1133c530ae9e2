use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameProposal {
    pub original_name: String,
    pub proposed_name: String,
    /// Shown to the operator next to the proposal; not part of the name.
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationDecision {
    pub folder: PathBuf,
    pub filename: String,
}

impl DestinationDecision {
    pub fn target(&self) -> PathBuf {
        self.folder.join(&self.filename)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlacementOutcome {
    Moved,
    Abandoned,
    Failed,
}

impl std::fmt::Display for PlacementOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Moved => write!(f, "moved"),
            Self::Abandoned => write!(f, "abandoned"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal state of one task. Unless the outcome is `Moved`, `final_path`
/// is the source, which stays where it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementResult {
    pub source: PathBuf,
    pub final_path: PathBuf,
    pub outcome: PlacementOutcome,
}

impl PlacementResult {
    pub fn moved(source: PathBuf, final_path: PathBuf) -> Self {
        Self {
            source,
            final_path,
            outcome: PlacementOutcome::Moved,
        }
    }

    pub fn abandoned(source: PathBuf) -> Self {
        Self {
            final_path: source.clone(),
            source,
            outcome: PlacementOutcome::Abandoned,
        }
    }

    pub fn failed(source: PathBuf) -> Self {
        Self {
            final_path: source.clone(),
            source,
            outcome: PlacementOutcome::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenameTally {
    pub renamed: usize,
    pub skipped: usize,
    pub total: usize,
}
