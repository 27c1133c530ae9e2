use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityPolicy {
    /// Pause before the first sample so a copy has a chance to start.
    pub grace: Duration,
    pub max_wait: Duration,
    pub sample_interval: Duration,
}

impl StabilityPolicy {
    pub const fn sorter() -> Self {
        Self {
            grace: Duration::from_secs(2),
            max_wait: Duration::from_secs(30),
            sample_interval: Duration::from_millis(500),
        }
    }

    pub const fn supervisor() -> Self {
        Self {
            grace: Duration::ZERO,
            max_wait: Duration::from_secs(60),
            sample_interval: Duration::from_millis(500),
        }
    }

    /// Grace delay followed by the stability poll.
    pub fn wait(&self, path: &Path) -> bool {
        if !self.grace.is_zero() {
            thread::sleep(self.grace);
        }
        is_stable(path, self.max_wait, self.sample_interval)
    }
}

/// True once two consecutive size samples agree and are non-zero; false when
/// `max_wait` runs out first. A vanished file skips the sample without
/// resetting the previous size or the deadline. Blocks the calling thread.
pub fn is_stable(path: &Path, max_wait: Duration, sample_interval: Duration) -> bool {
    let deadline = Instant::now() + max_wait;
    let mut last_size: Option<u64> = None;

    while Instant::now() < deadline {
        if let Ok(meta) = std::fs::metadata(path) {
            let size = meta.len();
            if size > 0 && last_size == Some(size) {
                return true;
            }
            last_size = Some(size);
        }
        thread::sleep(sample_interval);
    }
    false
}
