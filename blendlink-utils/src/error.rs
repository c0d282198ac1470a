//! Error types for blendlink
//!
//! Provides a unified error type used across all blendlink crates.

use std::path::PathBuf;

/// Main error type for blendlink operations
#[derive(Debug, thiserror::Error)]
pub enum BlendlinkError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Launch Errors ===

    #[error("Control listener unavailable on port {port}: {source}")]
    ListenerUnavailable {
        port: u16,
        source: std::io::Error,
    },

    #[error("No Blender instance selected")]
    NoInstanceSelected,

    #[error("Failed to spawn process: {0}")]
    ProcessSpawn(String),

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    // === Protocol Errors ===

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid settings at {path}: {message}")]
    SettingsInvalid { path: PathBuf, message: String },

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlendlinkError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a spawn error
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::ProcessSpawn(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check whether this error aborts a single start attempt rather
    /// than an established process
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            Self::ListenerUnavailable { .. }
                | Self::NoInstanceSelected
                | Self::ProcessSpawn(_)
                | Self::FileWrite { .. }
                | Self::FileRead { .. }
        )
    }
}

/// Result type alias using BlendlinkError
pub type Result<T> = std::result::Result<T, BlendlinkError>;
