use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::AppError;
use crate::models::task::DropEvent;
use crate::services::naming_service::has_extension;
use crate::services::stability_service::StabilityPolicy;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub extension: String,
    /// Also react to files renamed or moved into the directory.
    pub include_moves: bool,
    pub policy: StabilityPolicy,
}

/// What the watcher reports for each qualifying path once its stability
/// check has finished.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Stable(DropEvent),
    Unstable(PathBuf),
}

pub type WatchCallback = Arc<dyn Fn(WatchEvent) + Send + Sync>;

/// Keeps the subscription alive; dropping it stops watching. Stability
/// checks already running finish on their own threads.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    directory: PathBuf,
}

impl WatchHandle {
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Paths in `event` that should go through a stability check.
pub fn candidate_paths(event: &Event, options: &WatchOptions) -> Vec<PathBuf> {
    let paths: Vec<&PathBuf> = match &event.kind {
        EventKind::Create(CreateKind::File) | EventKind::Create(CreateKind::Any) => {
            event.paths.iter().collect()
        }
        EventKind::Modify(ModifyKind::Name(mode)) if options.include_moves => match mode {
            RenameMode::To => event.paths.iter().collect(),
            // [from, to]
            RenameMode::Both => event.paths.last().into_iter().collect(),
            // Some backends cannot tell the two ends apart; only the end
            // that exists now is interesting.
            RenameMode::Any => event.paths.iter().filter(|p| p.exists()).collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    paths
        .into_iter()
        .filter(|p| !p.is_dir())
        .filter(|p| {
            p.file_name()
                .map(|n| has_extension(&n.to_string_lossy(), &options.extension))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Documents already sitting in `directory`, sorted by name.
pub fn scan_existing(directory: &Path, extension: &str) -> Result<Vec<PathBuf>, AppError> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(directory)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .map(|n| has_extension(&n.to_string_lossy(), extension))
                .unwrap_or(false)
        })
        .collect();
    found.sort();
    Ok(found)
}

/// Collapses concurrent stability checks of one path into one.
#[derive(Debug, Default, Clone)]
struct PendingChecks {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl PendingChecks {
    fn claim(&self, path: &Path) -> bool {
        self.paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.to_path_buf())
    }

    fn release(&self, path: &Path) {
        self.paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(path);
    }
}

fn spawn_stability_check(
    path: PathBuf,
    policy: StabilityPolicy,
    pending: PendingChecks,
    callback: WatchCallback,
) {
    if !pending.claim(&path) {
        tracing::debug!(path = %path.display(), "stability check already running");
        return;
    }
    let spawned = thread::Builder::new()
        .name("stability-check".to_string())
        .spawn({
            let path = path.clone();
            let pending = pending.clone();
            move || {
                let stable = policy.wait(&path);
                pending.release(&path);
                if stable {
                    callback(WatchEvent::Stable(DropEvent::new(path)));
                } else {
                    callback(WatchEvent::Unstable(path));
                }
            }
        });
    if let Err(e) = spawned {
        pending.release(&path);
        tracing::error!(path = %path.display(), "cannot start stability check: {e}");
    }
}

/// Subscribes to `directory` (non-recursive). Each qualifying path is
/// checked for stability on its own thread and then reported to `callback`.
pub fn start_watching(
    directory: &Path,
    options: WatchOptions,
    callback: WatchCallback,
) -> Result<WatchHandle, AppError> {
    if !directory.is_dir() {
        return Err(AppError::Watcher(format!(
            "not a directory: {}",
            directory.display()
        )));
    }

    let pending = PendingChecks::default();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for path in candidate_paths(&event, &options) {
                spawn_stability_check(path, options.policy, pending.clone(), callback.clone());
            }
        }
        Err(e) => tracing::warn!("watcher error: {e}"),
    })?;
    watcher.watch(directory, RecursiveMode::NonRecursive)?;

    tracing::info!(directory = %directory.display(), "watching for new documents");
    Ok(WatchHandle {
        _watcher: watcher,
        directory: directory.to_path_buf(),
    })
}
