//! Running process registry
//!
//! An insertion-ordered collection of launched-instance records.
//! Launch order is display order. The registry has a single writer,
//! the host coordination task; everything else observes it through
//! snapshots or submits events instead of mutating it.

use crate::process::{InstanceHandle, ProcessId, ProcessInfo, ProcessState};

/// Ordered registry of launched instances
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    entries: Vec<InstanceHandle>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a record; launch order is preserved
    pub fn push(&mut self, handle: InstanceHandle) {
        self.entries.push(handle);
    }

    pub fn get(&self, id: ProcessId) -> Option<&InstanceHandle> {
        self.entries.iter().find(|handle| handle.id() == id)
    }

    pub fn get_mut(&mut self, id: ProcessId) -> Option<&mut InstanceHandle> {
        self.entries.iter_mut().find(|handle| handle.id() == id)
    }

    /// Remove and return a record
    pub fn remove(&mut self, id: ProcessId) -> Option<InstanceHandle> {
        let index = self.entries.iter().position(|handle| handle.id() == id)?;
        Some(self.entries.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstanceHandle> {
        self.entries.iter()
    }

    /// Records currently in `Connected` state
    pub fn connected(&self) -> impl Iterator<Item = &InstanceHandle> {
        self.entries
            .iter()
            .filter(|handle| handle.state() == ProcessState::Connected)
    }

    /// All record ids in launch order
    pub fn ids(&self) -> Vec<ProcessId> {
        self.entries.iter().map(|handle| handle.id()).collect()
    }

    /// Consistent snapshot for the presentation layer
    pub fn infos(&self) -> Vec<ProcessInfo> {
        self.entries.iter().map(|handle| handle.info()).collect()
    }
}
