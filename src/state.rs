use std::path::Path;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::activity_log::ActivityLog;

/// What every command needs: the loaded configuration and the shared
/// activity log.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub log: Arc<ActivityLog>,
}

impl AppState {
    /// Loads `config_path`, creates both folders and opens the log in the
    /// sorted folder.
    pub fn load(config_path: &Path) -> Result<Self, AppError> {
        Self::from_config(AppConfig::load(config_path)?)
    }

    pub fn from_config(config: AppConfig) -> Result<Self, AppError> {
        config.ensure_directories()?;
        let log = Arc::new(ActivityLog::open(&config.log_file())?);
        Ok(Self { config, log })
    }

    pub fn extension(&self) -> &'static str {
        self.config.document_extension()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Fresh state rooted in a scratch directory, with `ToSort` and `Sorted`
    /// created.
    pub(crate) fn scratch_state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{"watch_folder": "ToSort", "sorted_folder": "Sorted"}"#,
        )
        .unwrap();
        let state = AppState::load(&config_path).unwrap();
        (dir, state)
    }

    #[test]
    fn load_creates_folders_and_log() {
        let (dir, state) = scratch_state();
        assert!(dir.path().join("ToSort").is_dir());
        assert!(dir.path().join("Sorted").is_dir());
        assert_eq!(
            state.log.path(),
            dir.path().join("Sorted").join("paper_sorter_log.txt")
        );
        assert!(state.log.path().is_file());
    }

    #[test]
    fn missing_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppState::load(&dir.path().join("config.json")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
