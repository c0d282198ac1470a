//! Launch command assembly and process spawning
//!
//! The launch command is always `<executable> --python <connector> --`;
//! debug launches append the debugger arguments only when the debug
//! helper egg actually exists on disk, so a missing egg degrades to a
//! plain launch.

use std::path::Path;

use tokio::process::{Child, Command};
use tracing::info;

use blendlink_utils::{BlendlinkError, Result};

/// Fixed port the remote debugger listens on
pub const DEBUG_PORT: u16 = 8132;

/// Build the argument list for launching an instance
pub fn build_command(
    executable: &Path,
    connector: &Path,
    debug: bool,
    debug_egg: Option<&Path>,
) -> Vec<String> {
    let mut command = vec![
        executable.display().to_string(),
        "--python".to_string(),
        connector.display().to_string(),
        "--".to_string(),
    ];

    if debug {
        if let Some(egg) = debug_egg {
            command.push("debug_mode".to_string());
            command.push(".".to_string());
            command.push("debug_port".to_string());
            command.push(DEBUG_PORT.to_string());
            command.push("debug_egg".to_string());
            command.push(egg.display().to_string());
        }
    }

    command
}

/// Spawn the built command with the project root as working directory
pub fn spawn(command: &[String], work_dir: &Path) -> Result<Child> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| BlendlinkError::internal("empty launch command"))?;

    info!("spawning {} in {}", program, work_dir.display());

    Command::new(program)
        .args(args)
        .current_dir(work_dir)
        .spawn()
        .map_err(|e| BlendlinkError::ProcessSpawn(format!("{}: {}", program, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    // ==================== Command Assembly Tests ====================

    #[test]
    fn test_plain_launch_command() {
        let command = build_command(
            Path::new("/usr/bin/blender"),
            Path::new("/tmp/blendlink/blendlink_connector.py"),
            false,
            None,
        );
        assert_eq!(
            command,
            vec![
                "/usr/bin/blender",
                "--python",
                "/tmp/blendlink/blendlink_connector.py",
                "--",
            ]
        );
    }

    #[test]
    fn test_debug_launch_command_with_egg() {
        let command = build_command(
            Path::new("/usr/bin/blender"),
            Path::new("/tmp/blendlink/blendlink_connector.py"),
            true,
            Some(Path::new("/opt/pydevd-pycharm.egg")),
        );
        assert_eq!(
            command,
            vec![
                "/usr/bin/blender",
                "--python",
                "/tmp/blendlink/blendlink_connector.py",
                "--",
                "debug_mode",
                ".",
                "debug_port",
                "8132",
                "debug_egg",
                "/opt/pydevd-pycharm.egg",
            ]
        );
    }

    #[test]
    fn test_debug_launch_without_egg_degrades_to_plain() {
        let plain = build_command(
            Path::new("/usr/bin/blender"),
            Path::new("/tmp/c.py"),
            false,
            None,
        );
        let debug_no_egg = build_command(
            Path::new("/usr/bin/blender"),
            Path::new("/tmp/c.py"),
            true,
            None,
        );
        assert_eq!(plain, debug_no_egg);
    }

    #[test]
    fn test_egg_ignored_outside_debug_mode() {
        let command = build_command(
            Path::new("/usr/bin/blender"),
            Path::new("/tmp/c.py"),
            false,
            Some(Path::new("/opt/pydevd-pycharm.egg")),
        );
        assert!(!command.iter().any(|arg| arg == "debug_egg"));
    }

    // ==================== Spawn Tests ====================

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let command = vec![
            "/nonexistent/blender-binary".to_string(),
            "--python".to_string(),
        ];
        let result = spawn(&command, Path::new("/tmp"));
        assert!(matches!(result, Err(BlendlinkError::ProcessSpawn(_))));
    }

    #[tokio::test]
    async fn test_spawn_empty_command() {
        let result = spawn(&[], Path::new("/tmp"));
        assert!(matches!(result, Err(BlendlinkError::Internal(_))));
    }

    #[tokio::test]
    async fn test_spawn_sets_work_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let marker: PathBuf = temp.path().join("marker");

        let command = vec![
            "touch".to_string(),
            marker.file_name().unwrap().to_string_lossy().into_owned(),
        ];
        let mut child = spawn(&command, temp.path()).unwrap();
        child.wait().await.unwrap();

        assert!(marker.exists());
    }
}
