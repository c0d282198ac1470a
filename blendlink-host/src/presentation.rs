//! Presentation adapter seam
//!
//! The UI that lists running instances lives outside this crate; the
//! host loop drives it through this trait. Calls arrive only from the
//! coordination task, so implementations never see concurrent mutation.

use tracing::info;

use crate::process::{ProcessId, ProcessInfo};

/// Interface the host loop renders through
pub trait Presentation: Send {
    /// A record was appended to the registry
    fn instance_added(&mut self, info: &ProcessInfo);

    /// A record was retired and removed from the registry
    fn instance_removed(&mut self, id: ProcessId);

    /// The record became the current UI selection
    fn focus(&mut self, id: ProcessId);
}

/// Presentation that narrates to the log, used by the daemon binary
#[derive(Debug, Default)]
pub struct LogPresentation;

impl Presentation for LogPresentation {
    fn instance_added(&mut self, info: &ProcessInfo) {
        info!(
            "instance added: {} ({}, debug={})",
            info.id,
            info.executable.display(),
            info.debug
        );
    }

    fn instance_removed(&mut self, id: ProcessId) {
        info!("instance removed: {}", id);
    }

    fn focus(&mut self, id: ProcessId) {
        info!("instance focused: {}", id);
    }
}
