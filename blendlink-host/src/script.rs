//! Connector-script materialization
//!
//! The connector is bundled into the binary and guaranteed on disk at a
//! fixed, session-independent path before any instance starts. A stale
//! copy (content drift after an upgrade) is rewritten in place; any I/O
//! failure here fails the start operation.

use std::path::{Path, PathBuf};

use tracing::debug;

use blendlink_utils::{paths, BlendlinkError, Result};

/// File name the connector is materialized under
pub const CONNECTOR_FILE_NAME: &str = "blendlink_connector.py";

/// Bundled connector source
const CONNECTOR_SOURCE: &str = include_str!("../resources/blendlink_connector.py");

/// Path the connector is materialized at
///
/// Location: `<system temp dir>/blendlink/blendlink_connector.py`
pub fn connector_path() -> PathBuf {
    paths::connector_dir().join(CONNECTOR_FILE_NAME)
}

/// Ensure the connector exists on disk with the bundled content
///
/// Returns the path it lives at.
pub fn materialize_connector() -> Result<PathBuf> {
    let path = connector_path();
    materialize_at(&path)?;
    Ok(path)
}

fn materialize_at(path: &Path) -> Result<()> {
    if path.exists() {
        match std::fs::read_to_string(path) {
            Ok(current) if current == CONNECTOR_SOURCE => return Ok(()),
            _ => debug!("connector at {} is stale, rewriting", path.display()),
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BlendlinkError::FileWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    // Stage and rename so a concurrent launch never sees a half-written
    // connector
    let staged = path.with_extension("py.staged");
    std::fs::write(&staged, CONNECTOR_SOURCE).map_err(|e| BlendlinkError::FileWrite {
        path: staged.clone(),
        source: e,
    })?;
    std::fs::rename(&staged, path).map_err(|e| BlendlinkError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}
