use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Append-only, timestamped log of what happened to each document. Built
/// once at startup and shared by `Arc`; every line is also mirrored to the
/// terminal through `tracing`.
#[derive(Debug)]
pub struct ActivityLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ActivityLog {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Warning, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Error, message.as_ref());
    }

    pub fn write(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => tracing::info!(target: "activity", "{message}"),
            LogLevel::Warning => tracing::warn!(target: "activity", "{message}"),
            LogLevel::Error => tracing::error!(target: "activity", "{message}"),
        }

        let line = format_line(chrono::Local::now(), level, message);
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
            tracing::error!(path = %self.path.display(), "failed to append to activity log: {e}");
        }
    }

    pub fn read_to_string(&self) -> Result<String, AppError> {
        Ok(fs::read_to_string(&self.path)?)
    }
}

fn format_line<Tz>(at: chrono::DateTime<Tz>, level: LogLevel, message: &str) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{} - {level} - {message}\n", at.format("%Y-%m-%d %H:%M:%S,%3f"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn line_format_has_timestamp_level_and_message() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let line = format_line(at, LogLevel::Warning, "DUPLICATE: skipped");
        assert_eq!(line, "2024-03-09 14:05:07,000 - WARNING - DUPLICATE: skipped\n");
    }

    #[test]
    fn appends_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sorted").join("log.txt");

        let log = ActivityLog::open(&path).unwrap();
        log.info("first");
        log.error("second");
        drop(log);

        let reopened = ActivityLog::open(&path).unwrap();
        reopened.warn("third");

        let content = reopened.read_to_string().unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(" - INFO - first"));
        assert!(lines[1].ends_with(" - ERROR - second"));
        assert!(lines[2].ends_with(" - WARNING - third"));
    }
}
