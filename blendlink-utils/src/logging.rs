//! Logging infrastructure for blendlink
//!
//! Provides unified logging setup using the tracing ecosystem.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::{paths, BlendlinkError, Result};

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr
    Stderr,
    /// Log to file (for the host daemon)
    File,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output destination
    pub output: LogOutput,
    /// Log level filter (e.g., "info", "blendlink_host=debug")
    pub filter: String,
    /// Include file/line in logs
    pub file_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            file_line: false,
        }
    }
}

impl LogConfig {
    /// Create config for the host daemon (file logging)
    pub fn host() -> Self {
        Self {
            output: LogOutput::File,
            filter: std::env::var("BLENDLINK_LOG").unwrap_or_else(|_| "info".into()),
            file_line: true,
        }
    }

    /// Create config for development (verbose stderr)
    pub fn development() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "debug".into(),
            file_line: true,
        }
    }
}

/// Initialize logging with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| BlendlinkError::config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(config.file_line)
        .with_line_number(config.file_line);

    match config.output {
        LogOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| BlendlinkError::internal(format!("Failed to init logging: {}", e)))?;
        }
        LogOutput::File => {
            let log_dir = paths::log_dir();
            std::fs::create_dir_all(&log_dir).map_err(|e| BlendlinkError::FileWrite {
                path: log_dir.clone(),
                source: e,
            })?;

            let log_path = log_dir.join("blendlink.log");
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .map_err(|e| BlendlinkError::FileWrite {
                    path: log_path,
                    source: e,
                })?;

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(file).with_ansi(false))
                .try_init()
                .map_err(|e| BlendlinkError::internal(format!("Failed to init logging: {}", e)))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    /// Serializes tests that touch `BLENDLINK_LOG`
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // ==================== LogConfig Tests ====================

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.output, LogOutput::Stderr);
        assert_eq!(config.filter, "info");
        assert!(!config.file_line);
    }

    #[test]
    fn test_log_config_host() {
        let _guard = ENV_LOCK.lock().unwrap();
        let original = env::var("BLENDLINK_LOG").ok();
        env::remove_var("BLENDLINK_LOG");

        let config = LogConfig::host();
        assert_eq!(config.output, LogOutput::File);
        assert_eq!(config.filter, "info");
        assert!(config.file_line);

        if let Some(val) = original {
            env::set_var("BLENDLINK_LOG", val);
        }
    }

    #[test]
    fn test_log_config_host_with_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        let original = env::var("BLENDLINK_LOG").ok();
        env::set_var("BLENDLINK_LOG", "trace");

        let config = LogConfig::host();
        assert_eq!(config.filter, "trace");

        match original {
            Some(val) => env::set_var("BLENDLINK_LOG", val),
            None => env::remove_var("BLENDLINK_LOG"),
        }
    }

    #[test]
    fn test_log_config_development() {
        let config = LogConfig::development();
        assert_eq!(config.output, LogOutput::Stderr);
        assert_eq!(config.filter, "debug");
        assert!(config.file_line);
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LogConfig {
            filter: "not a [valid filter".into(),
            ..LogConfig::default()
        };
        let result = init_logging_with_config(config);
        assert!(matches!(result, Err(BlendlinkError::Config(_))));
    }

    // Note: successful init_logging() is not exercised here because the
    // tracing subscriber can only be installed once per process and
    // tests share one.
}
