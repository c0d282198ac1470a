//! blendlink-utils: Common utilities shared by the blendlink crates
//!
//! Provides the unified error type, logging setup, and path helpers.

pub mod error;
pub mod logging;
pub mod paths;

pub use error::{BlendlinkError, Result};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogOutput};
pub use paths::{config_dir, connector_dir, debug_egg_path, log_dir, settings_file};
