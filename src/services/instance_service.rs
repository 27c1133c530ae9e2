use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, RefreshKind, System};

use crate::config::project_dirs;
use crate::error::AppError;

pub const LOCK_FILE_NAME: &str = "paper-sorter.pid";
pub const APP_PROCESS_NAME: &str = "paper-sorter";

/// Where the running sorter advertises its PID.
pub fn default_lock_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_local_dir().join(LOCK_FILE_NAME))
        .unwrap_or_else(|| std::env::temp_dir().join(LOCK_FILE_NAME))
}

pub fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn processes_only() -> System {
    System::new_with_specifics(RefreshKind::nothing())
}

/// Exited but unreaped processes still show up in the table.
fn is_live(process: &Process) -> bool {
    !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
}

pub fn is_pid_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = processes_only();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing(),
    );
    system.process(pid).is_some_and(is_live)
}

/// Any process whose executable name is `name`, with or without an
/// extension.
pub fn is_process_named(name: &str) -> bool {
    let mut system = processes_only();
    system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::nothing());
    system.processes().values().filter(|p| is_live(p)).any(|process| {
        let found = process.name().to_string_lossy();
        let stem = Path::new(found.as_ref())
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        stem.eq_ignore_ascii_case(name)
    })
}

/// Whether the sorter is running: the PID in the lock file when there is
/// one, a process-name scan otherwise.
pub fn is_app_running(lock_path: &Path) -> bool {
    match read_pid(lock_path) {
        Some(pid) => is_pid_alive(pid),
        None => is_process_named(APP_PROCESS_NAME),
    }
}

/// Writes `pid` to a private staging file and links it into place, so the
/// lock never exists without its owner. Fails with `AlreadyExists` when
/// another lock is there.
fn publish_pid(path: &Path, pid: u32) -> io::Result<()> {
    let mut staging_name = path.file_name().unwrap_or_default().to_os_string();
    staging_name.push(format!(".{pid}.tmp"));
    let staging = path.with_file_name(staging_name);

    fs::write(&staging, format!("{pid}\n"))?;
    let linked = fs::hard_link(&staging, path);
    let _ = fs::remove_file(&staging);
    linked
}

/// Single-instance guard for the sorter. Removes its lock file on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    pid: u32,
}

impl InstanceLock {
    /// Takes the lock at `path`. A lock left behind by a dead process is
    /// replaced; a live one is `AlreadyRunning`.
    pub fn acquire(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let pid = std::process::id();

        for _ in 0..2 {
            match publish_pid(path, pid) {
                Ok(()) => {
                    return Ok(Self {
                        path: path.to_path_buf(),
                        pid,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => match read_pid(path) {
                    Some(owner) if owner != pid && is_pid_alive(owner) => {
                        return Err(AppError::AlreadyRunning(owner));
                    }
                    stale => {
                        tracing::info!(?stale, path = %path.display(), "removing stale instance lock");
                        if read_pid(path) == stale {
                            fs::remove_file(path)?;
                        }
                    }
                },
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::General(format!(
            "could not take instance lock at {}",
            path.display()
        )))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Only remove the file if it is still ours.
        if read_pid(&self.path) == Some(self.pid) {
            let _ = fs::remove_file(&self.path);
        }
    }
}
