use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Moves `source` into `dest_folder` as `desired_name`, or as `stem-N.ext`
/// for the first free `N`, never replacing an existing file. The folder is
/// created if needed.
///
/// Each candidate is claimed with a create-exclusive placeholder before the
/// source is moved onto it, so two placements racing for the same name end
/// up with different suffixes instead of one overwriting the other.
pub fn place(source: &Path, dest_folder: &Path, desired_name: &str) -> Result<PathBuf, AppError> {
    if !source.is_file() {
        return Err(AppError::Placement(format!(
            "source does not exist: {}",
            source.display()
        )));
    }
    fs::create_dir_all(dest_folder)?;

    let target = claim_free_name(dest_folder, desired_name)?;
    if let Err(e) = move_onto_claim(source, &target) {
        let _ = fs::remove_file(&target);
        return Err(e);
    }
    Ok(target)
}

/// Copies `source` into `folder` under its own name, suffixing on collision.
pub fn copy_into(source: &Path, folder: &Path) -> Result<PathBuf, AppError> {
    let name = source
        .file_name()
        .ok_or_else(|| AppError::Placement(format!("invalid source path: {}", source.display())))?
        .to_string_lossy()
        .to_string();
    fs::create_dir_all(folder)?;

    let target = claim_free_name(folder, &name)?;
    if let Err(e) = fs::copy(source, &target) {
        let _ = fs::remove_file(&target);
        return Err(e.into());
    }
    Ok(target)
}

/// Renames within the source's own directory. An existing file with the new
/// name is a conflict; no suffixing.
pub fn rename_in_place(source: &Path, new_name: &str) -> Result<PathBuf, AppError> {
    let parent = source
        .parent()
        .ok_or_else(|| AppError::Placement(format!("invalid source path: {}", source.display())))?;
    let target = parent.join(new_name);

    if !source.is_file() {
        return Err(AppError::Placement(format!(
            "source does not exist: {}",
            source.display()
        )));
    }
    if !try_claim(&target)? {
        return Err(AppError::Conflict(target));
    }
    if let Err(e) = move_onto_claim(source, &target) {
        let _ = fs::remove_file(&target);
        return Err(e);
    }
    Ok(target)
}

/// Documents anywhere under `root` whose stem starts with `stem`.
pub fn find_probable_duplicates(root: &Path, stem: &str, extension: &str) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let path = e.path();
            let matches_ext = path
                .extension()
                .and_then(|x| x.to_str())
                .map(|x| x.eq_ignore_ascii_case(extension))
                .unwrap_or(false);
            let matches_stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().starts_with(stem))
                .unwrap_or(false);
            matches_ext && matches_stem
        })
        .map(|e| e.into_path())
        .collect()
}

pub fn suffixed_name(desired_name: &str, index: usize) -> String {
    let path = Path::new(desired_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| desired_name.to_string());
    match path.extension() {
        Some(ext) => format!("{stem}-{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{index}"),
    }
}

fn claim_free_name(folder: &Path, desired_name: &str) -> Result<PathBuf, AppError> {
    let first = folder.join(desired_name);
    if try_claim(&first)? {
        return Ok(first);
    }

    let mut index = 1usize;
    loop {
        let candidate = folder.join(suffixed_name(desired_name, index));
        if try_claim(&candidate)? {
            return Ok(candidate);
        }
        index += 1;
    }
}

fn try_claim(path: &Path) -> Result<bool, AppError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

// Rename replaces the empty placeholder in one step on every platform std
// supports; across filesystems fall back to copy + delete.
fn move_onto_claim(source: &Path, claimed: &Path) -> Result<(), AppError> {
    match fs::rename(source, claimed) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            fs::copy(source, claimed)?;
            fs::remove_file(source)?;
            Ok(())
        }
        Err(e) => Err(AppError::Placement(format!(
            "{} -> {}: {e}",
            source.display(),
            claimed.display()
        ))),
    }
}
