use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::instance_service::{self, APP_PROCESS_NAME};

pub const LAUNCH_DEBOUNCE: Duration = Duration::from_secs(5);

/// Lets at most one launch attempt through per debounce window. Checking
/// and recording happen under one lock.
#[derive(Debug)]
pub struct LaunchGate {
    debounce: Duration,
    last_attempt: Mutex<Option<Instant>>,
}

impl LaunchGate {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_attempt: Mutex::new(None),
        }
    }

    /// Records `now` as the latest attempt and returns true, unless the
    /// previous attempt is still inside the window.
    pub fn try_claim(&self, now: Instant) -> bool {
        let mut last = self
            .last_attempt
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = *last {
            if now.saturating_duration_since(previous) < self.debounce {
                return false;
            }
        }
        *last = Some(now);
        true
    }
}

pub trait InstanceProbe: Send + Sync {
    fn is_running(&self) -> bool;
}

pub trait Launcher: Send + Sync {
    fn launch(&self) -> Result<u32, AppError>;
}

/// Looks at the sorter's lock file, falling back to a process-name scan.
#[derive(Debug, Clone)]
pub struct PidFileProbe {
    lock_path: PathBuf,
}

impl PidFileProbe {
    pub fn new(lock_path: PathBuf) -> Self {
        Self { lock_path }
    }
}

impl InstanceProbe for PidFileProbe {
    fn is_running(&self) -> bool {
        instance_service::is_app_running(&self.lock_path)
    }
}

/// Starts the sorter as a child and reaps it on a background thread once it
/// exits, so a finished sorter never lingers as a zombie.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// `launch_command` from the config when set, used as is. Otherwise the
    /// `paper-sorter` executable next to `supervisor_exe` (or `app`, when
    /// given), pointed at the same config file and opened in a new terminal
    /// window so someone can answer its questions.
    pub fn from_config(
        config: &AppConfig,
        config_path: &Path,
        app: Option<PathBuf>,
        supervisor_exe: &Path,
    ) -> Result<Self, AppError> {
        if let Some(command) = &config.launch_command {
            let (program, args) = command
                .split_first()
                .ok_or_else(|| AppError::Config("launch_command is empty".to_string()))?;
            return Ok(Self::new(PathBuf::from(program), args.to_vec()));
        }

        let app = match app {
            Some(app) => app,
            None => sibling_app_path(supervisor_exe),
        };
        let app_args = [
            "--config".to_string(),
            config_path.display().to_string(),
            "run".to_string(),
        ];
        let (program, args) = in_new_terminal(&app, &app_args);
        Ok(Self::new(program, args))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

pub fn sibling_app_path(supervisor_exe: &Path) -> PathBuf {
    let dir = supervisor_exe.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{APP_PROCESS_NAME}{}", std::env::consts::EXE_SUFFIX))
}

/// The command that runs `program args` in a fresh terminal window.
#[cfg(target_os = "macos")]
pub fn in_new_terminal(program: &Path, args: &[String]) -> (PathBuf, Vec<String>) {
    let command = std::iter::once(program.display().to_string())
        .chain(args.iter().cloned())
        .map(|word| shell_quote(&word))
        .collect::<Vec<_>>()
        .join(" ");
    let script = format!(
        "tell application \"Terminal\" to do script \"{}\"",
        command.replace('\\', "\\\\").replace('"', "\\\"")
    );
    (PathBuf::from("osascript"), vec!["-e".to_string(), script])
}

#[cfg(windows)]
pub fn in_new_terminal(program: &Path, args: &[String]) -> (PathBuf, Vec<String>) {
    // `start` takes the first quoted argument as the window title.
    let mut wrapped = vec!["/C".to_string(), "start".to_string(), String::new()];
    wrapped.push(program.display().to_string());
    wrapped.extend(args.iter().cloned());
    (PathBuf::from("cmd"), wrapped)
}

#[cfg(all(unix, not(target_os = "macos")))]
pub fn in_new_terminal(program: &Path, args: &[String]) -> (PathBuf, Vec<String>) {
    let mut wrapped = vec!["-e".to_string(), program.display().to_string()];
    wrapped.extend(args.iter().cloned());
    (PathBuf::from("x-terminal-emulator"), wrapped)
}

#[cfg(target_os = "macos")]
fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', "'\\''"))
}

impl Launcher for ProcessLauncher {
    fn launch(&self) -> Result<u32, AppError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| {
                AppError::General(format!("failed to start {}: {e}", self.program.display()))
            })?;
        let pid = child.id();

        let reaper = thread::Builder::new()
            .name(format!("reap-{pid}"))
            .spawn(move || match child.wait() {
                Ok(status) => tracing::info!(pid, %status, "launched process exited"),
                Err(e) => tracing::warn!(pid, "could not wait for launched process: {e}"),
            });
        if let Err(e) = reaper {
            tracing::warn!(pid, "launched process will not be reaped: {e}");
        }
        Ok(pid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchDecision {
    Debounced,
    AlreadyRunning,
    Launched(u32),
    LaunchFailed(String),
}

pub struct LaunchSupervisor {
    gate: LaunchGate,
    probe: Box<dyn InstanceProbe>,
    launcher: Box<dyn Launcher>,
}

impl LaunchSupervisor {
    pub fn new(gate: LaunchGate, probe: Box<dyn InstanceProbe>, launcher: Box<dyn Launcher>) -> Self {
        Self {
            gate,
            probe,
            launcher,
        }
    }

    /// Called once a dropped file has settled.
    pub fn on_stable_file_at(&self, path: &Path, now: Instant) -> LaunchDecision {
        if !self.gate.try_claim(now) {
            tracing::debug!(path = %path.display(), "launch debounced");
            return LaunchDecision::Debounced;
        }
        if self.probe.is_running() {
            tracing::info!(path = %path.display(), "sorter already running");
            return LaunchDecision::AlreadyRunning;
        }
        match self.launcher.launch() {
            Ok(pid) => {
                tracing::info!(pid, path = %path.display(), "started sorter");
                LaunchDecision::Launched(pid)
            }
            Err(e) => {
                tracing::error!("could not start sorter: {e}");
                LaunchDecision::LaunchFailed(e.to_string())
            }
        }
    }

    pub fn on_stable_file(&self, path: &Path) -> LaunchDecision {
        self.on_stable_file_at(path, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedProbe(Arc<AtomicBool>);

    impl InstanceProbe for FixedProbe {
        fn is_running(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct CountingLauncher(Arc<AtomicUsize>);

    impl Launcher for CountingLauncher {
        fn launch(&self) -> Result<u32, AppError> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) as u32 + 100)
        }
    }

    fn supervisor(running: bool) -> (LaunchSupervisor, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let running = Arc::new(AtomicBool::new(running));
        let launches = Arc::new(AtomicUsize::new(0));
        let supervisor = LaunchSupervisor::new(
            LaunchGate::new(LAUNCH_DEBOUNCE),
            Box::new(FixedProbe(running.clone())),
            Box::new(CountingLauncher(launches.clone())),
        );
        (supervisor, running, launches)
    }

    #[test]
    fn events_inside_the_window_launch_once() {
        let (supervisor, _, launches) = supervisor(false);
        let t0 = Instant::now();
        let file = Path::new("/drop/a.pdf");

        assert_eq!(supervisor.on_stable_file_at(file, t0), LaunchDecision::Launched(100));
        assert_eq!(
            supervisor.on_stable_file_at(file, t0 + Duration::from_secs(2)),
            LaunchDecision::Debounced
        );
        assert_eq!(launches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn events_outside_the_window_each_check() {
        let (supervisor, running, launches) = supervisor(false);
        let t0 = Instant::now();
        let file = Path::new("/drop/a.pdf");

        supervisor.on_stable_file_at(file, t0);
        running.store(true, Ordering::SeqCst);
        assert_eq!(
            supervisor.on_stable_file_at(file, t0 + Duration::from_secs(6)),
            LaunchDecision::AlreadyRunning
        );
        running.store(false, Ordering::SeqCst);
        assert_eq!(
            supervisor.on_stable_file_at(file, t0 + Duration::from_secs(12)),
            LaunchDecision::Launched(101)
        );
        assert_eq!(launches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn running_app_is_not_started_again() {
        let (supervisor, _, launches) = supervisor(true);
        assert_eq!(
            supervisor.on_stable_file(Path::new("/drop/a.pdf")),
            LaunchDecision::AlreadyRunning
        );
        assert_eq!(launches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn gate_is_atomic_under_contention() {
        let gate = Arc::new(LaunchGate::new(LAUNCH_DEBOUNCE));
        let now = Instant::now();
        let passed: usize = (0..8)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || gate.try_claim(now))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(passed, 1);
    }

    fn default_launcher() -> ProcessLauncher {
        let config = AppConfig::from_json(
            r#"{"watch_folder": "drop", "sorted_folder": "sorted"}"#,
            Path::new("/cfg"),
        )
        .unwrap();
        ProcessLauncher::from_config(
            &config,
            Path::new("/cfg/config.json"),
            None,
            Path::new("/opt/bin/watch-and-launch"),
        )
        .unwrap()
    }

    #[test]
    fn launcher_defaults_to_sibling_executable_in_a_terminal() {
        let launcher = default_launcher();
        let sibling = Path::new("/opt/bin")
            .join(format!("paper-sorter{}", std::env::consts::EXE_SUFFIX))
            .display()
            .to_string();

        assert_ne!(launcher.program(), Path::new(&sibling));
        let joined = launcher.args().join(" ");
        assert!(joined.contains(&sibling), "{joined}");
        assert!(joined.contains("/cfg/config.json"), "{joined}");
        assert!(joined.trim_end_matches(['"', '\'']).ends_with("run"), "{joined}");
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn terminal_wrapper_passes_arguments_through() {
        let launcher = default_launcher();
        assert_eq!(launcher.program(), Path::new("x-terminal-emulator"));
        assert_eq!(
            launcher.args(),
            ["-e", "/opt/bin/paper-sorter", "--config", "/cfg/config.json", "run"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn exited_child_is_reaped_and_not_reported_running() {
        let pid = ProcessLauncher::new(PathBuf::from("true"), Vec::new())
            .launch()
            .unwrap();

        let start = Instant::now();
        while instance_service::is_pid_alive(pid) && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(50));
        }
        assert!(!instance_service::is_pid_alive(pid));
    }

    #[test]
    fn launch_command_overrides_default() {
        let config = AppConfig::from_json(
            r#"{"watch_folder": "d", "sorted_folder": "s", "launch_command": ["open", "-a", "Terminal"]}"#,
            Path::new("/cfg"),
        )
        .unwrap();
        let launcher =
            ProcessLauncher::from_config(&config, Path::new("/cfg/config.json"), None, Path::new("/x"))
                .unwrap();
        assert_eq!(launcher.program(), Path::new("open"));
        assert_eq!(launcher.args(), ["-a", "Terminal"]);
    }
}
