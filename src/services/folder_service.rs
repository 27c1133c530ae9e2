use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::services::naming_service::sanitize_folder_name;

/// Visible subdirectories of `parent`, sorted by path. Unreadable folders
/// list as empty.
pub fn list_dirs(parent: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(parent) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path())
        .collect();
    dirs.sort();
    dirs
}

pub fn create_folder(parent: &Path, name: &str) -> Result<PathBuf, AppError> {
    let clean = sanitize_folder_name(name).ok_or_else(|| {
        AppError::General("Folder name cannot be empty or only special characters.".to_string())
    })?;
    let path = parent.join(clean);
    match fs::create_dir(&path) {
        Ok(()) => Ok(path),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(AppError::Conflict(path)),
        Err(e) => Err(e.into()),
    }
}

/// Path of `path` relative to `root` for display; the full path when it is
/// not under `root`.
pub fn relative_display(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().to_string(),
        _ => path.to_string_lossy().to_string(),
    }
}

pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}
