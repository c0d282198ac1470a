//! blendlink host daemon
//!
//! Runs the host loop for the project in the current directory: loads
//! the configured instances, launches the first one (pass `--debug`
//! for a debug launch), and pushes addon reloads on every save until
//! interrupted.

use tracing::{info, warn};

use blendlink_host::settings::SettingsStore;
use blendlink_host::{Host, LogPresentation, ProjectSettings, SaveWatcher, TomlSettingsStore};
use blendlink_utils::{init_logging_with_config, paths, LogConfig, Result};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging_with_config(LogConfig::host())?;

    let debug = std::env::args().any(|arg| arg == "--debug");
    let project_root = std::env::current_dir()?;

    let store = TomlSettingsStore::new(paths::settings_file());
    let saved = store.load()?;
    let settings = ProjectSettings::from_saved(project_root.clone(), &saved);
    let first_instance = settings.instances().first().cloned();

    let host = Host::new(settings, Box::new(store), Box::new(LogPresentation));
    let handle = host.handle();

    let watcher = SaveWatcher::new(&project_root)?;
    tokio::spawn(watcher.run(handle.sender()));

    let loop_task = tokio::spawn(host.run());

    match first_instance {
        Some(instance) => {
            if let Err(e) = handle.start(Some(instance), debug).await {
                warn!("could not launch instance: {}", e);
            }
        }
        None => info!(
            "no instances configured; add one to {}",
            paths::settings_file().display()
        ),
    }

    tokio::signal::ctrl_c().await?;
    info!("interrupted, shutting down");

    let _ = handle.shutdown().await;
    let _ = loop_task.await;
    Ok(())
}
