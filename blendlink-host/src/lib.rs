//! blendlink-host: Launch and supervise Blender instances
//!
//! The host owns one control-socket listener per session, a registry of
//! launched instances, and the reload broadcaster that pushes addon
//! refreshes to every connected instance when a file is saved. All
//! registry and UI-facing mutation happens on one coordination task
//! ([`host::Host`]); socket I/O runs on per-connection tasks that
//! communicate with it through events.

pub mod host;
pub mod launch;
pub mod listener;
pub mod presentation;
pub mod process;
pub mod registry;
pub mod reload;
pub mod script;
pub mod settings;
pub mod watch;

pub use host::{Host, HostAction, HostEvent, HostHandle};
pub use listener::{ConnectionEvent, ControlListener};
pub use presentation::{LogPresentation, Presentation};
pub use process::{InstanceChannel, InstanceHandle, ProcessId, ProcessInfo, ProcessState};
pub use registry::ProcessRegistry;
pub use settings::{InstanceSpec, ProjectSettings, SettingsStore, TomlSettingsStore};
pub use watch::SaveWatcher;
