//! Host coordination loop
//!
//! The `Host` is the single writer for the running process registry and
//! all UI-facing state. Socket tasks, the save watcher, and user
//! actions submit [`HostEvent`]s over one channel; the loop applies
//! them in order, so no state here is ever mutated concurrently.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use blendlink_protocol::{HostRequest, InstanceResponse, CONTROL_PORT};
use blendlink_utils::{paths, BlendlinkError, Result};

use crate::launch;
use crate::listener::{ConnectionEvent, ControlListener};
use crate::presentation::Presentation;
use crate::process::{InstanceHandle, ProcessId};
use crate::registry::ProcessRegistry;
use crate::reload;
use crate::script;
use crate::settings::{AddonPathChange, InstanceSpec, ProjectSettings, SettingsStore};

/// Depth of the host event queue
const EVENT_QUEUE: usize = 256;

/// Everything the host loop reacts to
pub enum HostEvent {
    /// A user action routed in by the presentation layer
    Action(HostAction),
    /// An event from one armed control connection
    Connection(ConnectionEvent),
    /// The environment reported a file save
    FileSaved(PathBuf),
}

/// User actions on the host
pub enum HostAction {
    /// Launch the given instance; `None` means nothing was selected
    Start {
        instance: Option<Arc<InstanceSpec>>,
        debug: bool,
        reply: oneshot::Sender<Result<ProcessId>>,
    },
    /// Stop a launched instance
    Stop { process: ProcessId },
    /// Add an instance definition
    AddInstance {
        executable: PathBuf,
        reply: oneshot::Sender<Result<Arc<InstanceSpec>>>,
    },
    /// Remove an instance definition
    RemoveInstance { instance: Arc<InstanceSpec> },
    /// Stop all instances and leave the loop
    Shutdown,
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action(action) => write!(f, "Action({:?})", action),
            Self::Connection(event) => write!(f, "Connection({:?})", event),
            Self::FileSaved(path) => write!(f, "FileSaved({})", path.display()),
        }
    }
}

impl fmt::Debug for HostAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start { instance, debug, .. } => f
                .debug_struct("Start")
                .field("instance", &instance.as_ref().map(|s| s.executable()))
                .field("debug", debug)
                .finish(),
            Self::Stop { process } => write!(f, "Stop({})", process),
            Self::AddInstance { executable, .. } => {
                write!(f, "AddInstance({})", executable.display())
            }
            Self::RemoveInstance { instance } => {
                write!(f, "RemoveInstance({})", instance.executable().display())
            }
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

/// Handle for submitting actions to a running host loop
#[derive(Debug, Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<HostEvent>,
}

impl HostHandle {
    /// Raw event sender, for collaborators like the save watcher
    pub fn sender(&self) -> mpsc::Sender<HostEvent> {
        self.tx.clone()
    }

    pub async fn start(
        &self,
        instance: Option<Arc<InstanceSpec>>,
        debug: bool,
    ) -> Result<ProcessId> {
        let (reply, response) = oneshot::channel();
        self.send(HostEvent::Action(HostAction::Start {
            instance,
            debug,
            reply,
        }))
        .await?;
        response
            .await
            .map_err(|_| BlendlinkError::internal("host loop dropped the reply"))?
    }

    pub async fn stop(&self, process: ProcessId) -> Result<()> {
        self.send(HostEvent::Action(HostAction::Stop { process })).await
    }

    pub async fn add_instance(&self, executable: PathBuf) -> Result<Arc<InstanceSpec>> {
        let (reply, response) = oneshot::channel();
        self.send(HostEvent::Action(HostAction::AddInstance { executable, reply }))
            .await?;
        response
            .await
            .map_err(|_| BlendlinkError::internal("host loop dropped the reply"))?
    }

    pub async fn remove_instance(&self, instance: Arc<InstanceSpec>) -> Result<()> {
        self.send(HostEvent::Action(HostAction::RemoveInstance { instance }))
            .await
    }

    pub async fn notify_saved(&self, path: PathBuf) -> Result<()> {
        self.send(HostEvent::FileSaved(path)).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(HostEvent::Action(HostAction::Shutdown)).await
    }

    async fn send(&self, event: HostEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| BlendlinkError::internal("host loop is not running"))
    }
}

/// The coordination actor owning registry, settings, and listener
pub struct Host {
    settings: ProjectSettings,
    store: Box<dyn SettingsStore>,
    registry: ProcessRegistry,
    listener: ControlListener,
    presentation: Box<dyn Presentation>,
    events_tx: mpsc::Sender<HostEvent>,
    events_rx: mpsc::Receiver<HostEvent>,
}

impl Host {
    pub fn new(
        settings: ProjectSettings,
        store: Box<dyn SettingsStore>,
        presentation: Box<dyn Presentation>,
    ) -> Self {
        Self::with_port(settings, store, presentation, CONTROL_PORT)
    }

    /// Like [`Host::new`] with an explicit listener port (tests bind 0)
    pub fn with_port(
        settings: ProjectSettings,
        store: Box<dyn SettingsStore>,
        presentation: Box<dyn Presentation>,
        port: u16,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        Self {
            settings,
            store,
            registry: ProcessRegistry::new(),
            listener: ControlListener::new(port),
            presentation,
            events_tx,
            events_rx,
        }
    }

    pub fn handle(&self) -> HostHandle {
        HostHandle {
            tx: self.events_tx.clone(),
        }
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ProjectSettings {
        &mut self.settings
    }

    /// Bind the control listener ahead of the first start
    ///
    /// `start` opens it on demand; this exists so a caller can surface
    /// a taken port early (and so tests can learn an ephemeral port).
    pub async fn open_listener(&mut self) -> Result<()> {
        self.listener.open().await
    }

    pub fn listener(&self) -> &ControlListener {
        &self.listener
    }

    /// Run the coordination loop until shutdown
    pub async fn run(mut self) {
        info!(
            "host loop started for {}",
            self.settings.project_root().display()
        );
        while let Some(event) = self.events_rx.recv().await {
            if self.handle_event(event).await == Flow::Stop {
                break;
            }
        }
        info!("host loop stopped");
    }

    async fn handle_event(&mut self, event: HostEvent) -> Flow {
        match event {
            HostEvent::Action(action) => return self.handle_action(action).await,
            HostEvent::Connection(event) => self.handle_connection(event),
            HostEvent::FileSaved(path) => self.handle_file_saved(&path),
        }
        Flow::Continue
    }

    async fn handle_action(&mut self, action: HostAction) -> Flow {
        match action {
            HostAction::Start {
                instance,
                debug,
                reply,
            } => {
                let result = self.start_instance(instance, debug).await;
                if let Err(e) = &result {
                    warn!("start failed: {}", e);
                }
                let _ = reply.send(result);
            }
            HostAction::Stop { process } => self.retire(process),
            HostAction::AddInstance { executable, reply } => {
                let result = self.settings.add_instance(InstanceSpec::new(executable));
                if result.is_ok() {
                    self.persist();
                }
                let _ = reply.send(result);
            }
            HostAction::RemoveInstance { instance } => {
                if self.settings.remove_instance(&instance) {
                    self.persist();
                }
            }
            HostAction::Shutdown => {
                for id in self.registry.ids() {
                    self.retire(id);
                }
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Launch an instance: connector on disk, listener open and armed,
    /// process spawned, record registered and focused
    ///
    /// Any failure here aborts the whole start; no record is created.
    async fn start_instance(
        &mut self,
        instance: Option<Arc<InstanceSpec>>,
        debug: bool,
    ) -> Result<ProcessId> {
        let spec = instance.ok_or(BlendlinkError::NoInstanceSelected)?;

        let connector = script::materialize_connector()?;
        self.listener.open().await?;

        let egg = if debug { paths::debug_egg_path() } else { None };
        let command = launch::build_command(spec.executable(), &connector, debug, egg.as_deref());
        let child = launch::spawn(&command, self.settings.project_root())?;

        let handle = InstanceHandle::new(spec, child, debug);
        let id = handle.id();
        self.listener.arm(id, self.events_tx.clone())?;

        // Registered and focused before the handshake; the record has
        // no channel yet and the presentation must tolerate that
        let info = handle.info();
        self.registry.push(handle);
        self.presentation.instance_added(&info);
        self.presentation.focus(id);

        info!("{} launching: {:?}", id, command);
        Ok(id)
    }

    fn handle_connection(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Established { process, channel } => {
                // Addons whose directories vanished are dropped before
                // they are announced to the fresh instance
                if self.settings.prune_missing_addons() > 0 {
                    self.persist();
                }

                let Some(handle) = self.registry.get_mut(process) else {
                    debug!("{} connected after retirement, ignoring", process);
                    return;
                };
                if !handle.mark_connected(channel.clone()) {
                    return;
                }

                let request = HostRequest::PluginFolder {
                    project_folder: self.settings.project_root().display().to_string(),
                    addon_names: self.settings.addon_names().to_vec(),
                };
                if !channel.try_send(request) {
                    warn!("{} handshake request could not be queued", process);
                }
            }
            ConnectionEvent::Message { process, response } => {
                self.handle_response(process, response)
            }
            ConnectionEvent::Ended { process } => self.retire(process),
        }
    }

    fn handle_response(&mut self, process: ProcessId, response: InstanceResponse) {
        if self.registry.get(process).is_none() {
            debug!("message for retired {}, ignoring", process);
            return;
        }

        match response {
            InstanceResponse::PluginFolder { plugin_path } => {
                self.record_reported_addon_path(process, &plugin_path)
            }
            InstanceResponse::PluginRefresh { status } => {
                debug!("{} refresh acknowledged: {}", process, status);
            }
            InstanceResponse::Unknown { opcode } => {
                debug!("{} sent unknown opcode {}, ignoring", process, opcode);
            }
        }
    }

    fn record_reported_addon_path(&mut self, process: ProcessId, plugin_path: &str) {
        let reported = PathBuf::from(plugin_path);
        let Some(handle) = self.registry.get(process) else {
            return;
        };

        let change = handle.spec().record_addon_path(&reported);
        let is_debug = handle.is_debug();

        match change {
            AddonPathChange::Unchanged => return,
            AddonPathChange::FirstSeen => {
                info!("{} addon path learned: {}", process, plugin_path);
            }
            AddonPathChange::Drifted { previous } => {
                info!(
                    "{} addon path moved from {} to {}",
                    process,
                    previous.display(),
                    plugin_path
                );
                if is_debug {
                    // The runtime relaunched in a way that invalidates
                    // the debug session; kill it rather than debug
                    // against the wrong tree
                    warn!("{} addon path drifted mid-debug, terminating", process);
                    if let Some(handle) = self.registry.get_mut(process) {
                        handle.terminate();
                    }
                }
            }
        }
        self.persist();
    }

    fn handle_file_saved(&mut self, path: &Path) {
        let Some(addon) = reload::resolve_addon(
            self.settings.project_root(),
            self.settings.addon_names(),
            path,
        ) else {
            return;
        };

        let sent = reload::broadcast_refresh(&self.registry, &addon);
        info!(
            "{} saved, reload of {} sent to {} instances",
            path.display(),
            addon,
            sent
        );
    }

    /// Retire a record: kill the process, release its presentation
    /// entry, drop it from the registry
    ///
    /// Idempotent; retiring an unknown or already-retired id is a no-op.
    fn retire(&mut self, process: ProcessId) {
        let Some(mut handle) = self.registry.remove(process) else {
            return;
        };
        handle.terminate();
        self.presentation.instance_removed(process);
        info!("{} retired", process);
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.settings.to_saved()) {
            warn!("failed to persist settings: {}", e);
        }
    }
}
