//! Reload broadcasting
//!
//! A saved file maps to the addon it belongs to (its first path
//! component under the project root, provided that names a configured
//! addon). The resulting refresh request goes to every connected
//! instance, fire-and-forget; instances still launching are skipped,
//! not queued.

use std::path::Path;

use tracing::debug;

use blendlink_protocol::HostRequest;

use crate::registry::ProcessRegistry;

/// Resolve a saved file to the configured addon it belongs to
pub fn resolve_addon(project_root: &Path, addon_names: &[String], saved: &Path) -> Option<String> {
    let relative = saved.strip_prefix(project_root).ok()?;
    let first = relative.components().next()?;
    let name = first.as_os_str().to_str()?;
    addon_names
        .iter()
        .any(|addon| addon == name)
        .then(|| name.to_owned())
}

/// Send a refresh for one addon to every connected instance
///
/// Returns how many instances the request was queued for.
pub fn broadcast_refresh(registry: &ProcessRegistry, addon: &str) -> usize {
    let request = HostRequest::PluginRefresh {
        name_list: vec![addon.to_owned()],
    };

    let mut sent = 0;
    for handle in registry.connected() {
        let Some(channel) = handle.channel() else {
            continue;
        };
        if channel.try_send(request.clone()) {
            sent += 1;
        }
    }

    debug!("refresh of {} queued for {} instances", addon, sent);
    sent
}
