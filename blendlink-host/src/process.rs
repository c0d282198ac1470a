//! Launched-instance records and their lifecycle
//!
//! An [`InstanceHandle`] is the only owner of the spawned OS process.
//! Its state moves monotonically `Launching -> Connected -> Terminated`
//! (or straight to `Terminated` when a launch is stopped before the
//! instance ever connects); no transition goes backwards.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::process::Child;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use blendlink_protocol::HostRequest;

use crate::settings::InstanceSpec;

/// Unique identifier of one launched instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(Uuid);

impl ProcessId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.0)
    }
}

/// Lifecycle state of a launched instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Process spawned, listener armed, no control connection yet
    Launching,
    /// Control connection established, handshake sent
    Connected,
    /// Process exited or was stopped; the record is about to retire
    Terminated,
}

/// Outbound half of an established control connection
///
/// Sends are fire-and-forget: a full or closed channel drops the
/// message, it is never awaited.
#[derive(Debug, Clone)]
pub struct InstanceChannel {
    sender: mpsc::Sender<HostRequest>,
}

impl InstanceChannel {
    pub fn new(sender: mpsc::Sender<HostRequest>) -> Self {
        Self { sender }
    }

    /// Queue a request for the connection writer; returns whether it was
    /// accepted
    pub fn try_send(&self, request: HostRequest) -> bool {
        match self.sender.try_send(request) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("instance channel closed, request dropped");
                false
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("instance channel full, request dropped");
                false
            }
        }
    }
}

/// Snapshot of one record for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub id: ProcessId,
    pub executable: PathBuf,
    pub debug: bool,
    pub state: ProcessState,
}

/// One active launch: the instance definition it came from, the OS
/// process, and (once connected) the control channel
pub struct InstanceHandle {
    id: ProcessId,
    spec: Arc<InstanceSpec>,
    child: Child,
    debug: bool,
    channel: Option<InstanceChannel>,
    state: ProcessState,
}

impl InstanceHandle {
    pub fn new(spec: Arc<InstanceSpec>, child: Child, debug: bool) -> Self {
        Self {
            id: ProcessId::new(),
            spec,
            child,
            debug,
            channel: None,
            state: ProcessState::Launching,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn spec(&self) -> &Arc<InstanceSpec> {
        &self.spec
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// The control channel, present only while `Connected`
    pub fn channel(&self) -> Option<&InstanceChannel> {
        self.channel.as_ref()
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            id: self.id,
            executable: self.spec.executable().to_path_buf(),
            debug: self.debug,
            state: self.state,
        }
    }

    /// Assign the control channel on connection-established
    ///
    /// Only legal while `Launching`; a record never holds more than one
    /// channel. Returns whether the transition happened.
    pub fn mark_connected(&mut self, channel: InstanceChannel) -> bool {
        if self.state != ProcessState::Launching {
            warn!("{} cannot connect from state {:?}", self.id, self.state);
            return false;
        }
        debug_assert!(self.channel.is_none());
        self.channel = Some(channel);
        self.state = ProcessState::Connected;
        true
    }

    /// Kill the OS process and drop the control channel
    ///
    /// Idempotent: terminating an already-terminated record is a no-op.
    pub fn terminate(&mut self) {
        if self.state == ProcessState::Terminated {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            // Already exited on its own
            debug!("{} kill skipped: {}", self.id, e);
        }
        self.channel = None;
        self.state = ProcessState::Terminated;
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("id", &self.id)
            .field("executable", &self.spec.executable())
            .field("debug", &self.debug)
            .field("state", &self.state)
            .field("has_channel", &self.channel.is_some())
            .finish()
    }
}
