use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = "paper_sorter_log.txt";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DOCUMENT_EXTENSION: &str = "pdf";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub watch_folder: PathBuf,
    pub sorted_folder: PathBuf,
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides how the supervisor starts the main application.
    #[serde(default)]
    pub launch_command: Option<Vec<String>>,
}

impl AppConfig {
    /// Reads and validates a config file. Relative folders resolve against
    /// the directory holding the file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&raw, base)
    }

    pub fn from_json(raw: &str, base: &Path) -> Result<Self, AppError> {
        let mut config: AppConfig = serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("invalid configuration: {e}")))?;

        if config.watch_folder.as_os_str().is_empty() {
            return Err(AppError::Config("watch_folder is empty".to_string()));
        }
        if config.sorted_folder.as_os_str().is_empty() {
            return Err(AppError::Config("sorted_folder is empty".to_string()));
        }
        if let Some(command) = &config.launch_command {
            if command.is_empty() {
                return Err(AppError::Config("launch_command is empty".to_string()));
            }
        }

        config.watch_folder = resolve_folder(&config.watch_folder, base);
        config.sorted_folder = resolve_folder(&config.sorted_folder, base);
        Ok(config)
    }

    pub fn ensure_directories(&self) -> Result<(), AppError> {
        for dir in [&self.watch_folder, &self.sorted_folder] {
            fs::create_dir_all(dir).map_err(|e| {
                AppError::Config(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    pub fn log_file(&self) -> PathBuf {
        self.sorted_folder.join(LOG_FILE_NAME)
    }

    pub fn document_extension(&self) -> &'static str {
        DOCUMENT_EXTENSION
    }
}

fn resolve_folder(path: &Path, base: &Path) -> PathBuf {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

/// Picks the config file: explicit flag, then next to the executable, then
/// the platform config directory.
pub fn locate_config(explicit: Option<PathBuf>) -> Result<PathBuf, AppError> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path);
        }
        return Err(AppError::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    }

    let mut searched = Vec::new();
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        searched.push(exe_dir.join(CONFIG_FILE_NAME));
    }
    if let Some(dirs) = project_dirs() {
        searched.push(dirs.config_dir().join(CONFIG_FILE_NAME));
    }

    searched
        .iter()
        .find(|candidate| candidate.is_file())
        .cloned()
        .ok_or_else(|| {
            let listed: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
            AppError::Config(format!("{CONFIG_FILE_NAME} not found (searched: {})", listed.join(", ")))
        })
}

pub fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "paper-sorter")
}

pub fn api_key_from_env() -> Result<String, AppError> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("{API_KEY_ENV} not set")))
}
