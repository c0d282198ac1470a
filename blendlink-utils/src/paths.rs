//! Path utilities for blendlink
//!
//! The connector script lives under the system temp directory at a
//! session-independent path shared by every project; config and logs
//! follow the XDG base directories.

use std::path::PathBuf;

use directories::ProjectDirs;

/// Application identifier for XDG directories
const APP_NAME: &str = "blendlink";

/// Environment variable overriding the debug helper egg location
pub const DEBUG_EGG_ENV: &str = "BLENDLINK_DEBUG_EGG";

/// File name of the debug helper egg
const DEBUG_EGG_FILE: &str = "pydevd-pycharm.egg";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Directory the connector script is materialized into
///
/// Location: `<system temp dir>/blendlink`
pub fn connector_dir() -> PathBuf {
    std::env::temp_dir().join(APP_NAME)
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/blendlink` or `~/.config/blendlink`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| home_dir().join(".config").join(APP_NAME))
}

/// Get the project settings file path
///
/// Location: `$XDG_CONFIG_HOME/blendlink/settings.toml`
pub fn settings_file() -> PathBuf {
    config_dir().join("settings.toml")
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/blendlink/log` or `~/.local/state/blendlink/log`
pub fn log_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| home_dir().join(".local").join("state").join(APP_NAME))
        .join("log")
}

/// Locate the remote-debug helper egg, if installed
///
/// Checked in order: the `BLENDLINK_DEBUG_EGG` environment variable,
/// then `<config dir>/pydevd-pycharm.egg`. Returns `None` when neither
/// points at an existing file; debug launches then degrade to plain
/// launches.
pub fn debug_egg_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(DEBUG_EGG_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Some(path);
        }
    }

    let bundled = config_dir().join(DEBUG_EGG_FILE);
    bundled.is_file().then_some(bundled)
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &PathBuf) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
