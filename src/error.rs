use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No text content in {0}")]
    NoText(String),

    #[error("Malformed extractor response: {0}")]
    MalformedResponse(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Placement error: {0}")]
    Placement(String),

    #[error("destination already exists: {}", .0.display())]
    Conflict(PathBuf),

    #[error("{0} queue is closed")]
    QueueClosed(String),

    #[error("another instance is already running (pid {0})")]
    AlreadyRunning(u32),

    #[error("stdin is not a terminal; nobody can answer the sorter's questions")]
    NotInteractive,

    #[error("{0}")]
    General(String),
}

impl AppError {
    /// Extraction failures drop the task; everything else is a bug or an
    /// environment problem worth surfacing differently.
    pub fn is_extraction_failure(&self) -> bool {
        matches!(
            self,
            Self::NoText(_) | Self::MalformedResponse(_) | Self::Extraction(_) | Self::Http(_)
        )
    }
}

impl From<notify::Error> for AppError {
    fn from(err: notify::Error) -> Self {
        Self::Watcher(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_failures_are_classified() {
        assert!(AppError::NoText("a.pdf".into()).is_extraction_failure());
        assert!(AppError::MalformedResponse("no json".into()).is_extraction_failure());
        assert!(!AppError::Config("missing".into()).is_extraction_failure());
        assert!(!AppError::Conflict(PathBuf::from("/x")).is_extraction_failure());
    }

    #[test]
    fn conflict_message_names_the_path() {
        let err = AppError::Conflict(PathBuf::from("/sorted/Doe_Nature_2021.pdf"));
        assert_eq!(
            err.to_string(),
            "destination already exists: /sorted/Doe_Nature_2021.pdf"
        );
    }
}
