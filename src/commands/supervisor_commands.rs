use std::future::Future;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::instance_service::default_lock_path;
use crate::services::launch_service::{
    LaunchGate, LaunchSupervisor, Launcher, PidFileProbe, LAUNCH_DEBOUNCE,
};
use crate::services::stability_service::StabilityPolicy;
use crate::services::watch_service::{self, WatchEvent, WatchOptions};

/// Builds the supervisor that starts the sorter through `launcher`, using
/// the sorter's lock file to tell whether it is already up.
pub fn build_supervisor(launcher: Box<dyn Launcher>) -> LaunchSupervisor {
    LaunchSupervisor::new(
        LaunchGate::new(LAUNCH_DEBOUNCE),
        Box::new(PidFileProbe::new(default_lock_path())),
        launcher,
    )
}

/// Watches the drop folder (creations and move-ins) and hands every settled
/// document to `supervisor` until `shutdown` resolves.
pub async fn run_supervisor<F>(
    config: &AppConfig,
    supervisor: LaunchSupervisor,
    shutdown: F,
) -> Result<(), AppError>
where
    F: Future<Output = ()>,
{
    config.ensure_directories()?;
    let supervisor = Arc::new(supervisor);

    let handle = watch_service::start_watching(
        &config.watch_folder,
        WatchOptions {
            extension: config.document_extension().to_string(),
            include_moves: true,
            policy: StabilityPolicy::supervisor(),
        },
        Arc::new(move |event: WatchEvent| match event {
            WatchEvent::Stable(dropped) => {
                supervisor.on_stable_file(&dropped.path);
            }
            WatchEvent::Unstable(path) => {
                tracing::warn!(path = %path.display(), "file never settled; ignoring");
            }
        }),
    )?;
    tracing::info!(folder = %handle.directory().display(), "supervisor watching");

    shutdown.await;
    tracing::info!("supervisor stopping");
    Ok(())
}
