//! Save watcher feeding the host loop
//!
//! The core consumes "file saved" events; where they come from is a
//! collaborator concern. This watcher is the daemon's default source:
//! a debounced recursive watch over the project root. An IDE embedding
//! the host can skip it and push `HostEvent::FileSaved` itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use tokio::sync::mpsc;
use tracing::{info, warn};

use blendlink_utils::{BlendlinkError, Result};

use crate::host::HostEvent;

/// Debounce window for bursts of writes to the same file
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Watches the project tree and reports saved files
pub struct SaveWatcher {
    project_root: PathBuf,
    rx: mpsc::UnboundedReceiver<Result<Vec<Event>>>,
    /// Keeps the native watcher alive
    _debouncer: Debouncer<RecommendedWatcher, FileIdMap>,
}

impl SaveWatcher {
    /// Watch the project root recursively
    pub fn new(project_root: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(
            DEBOUNCE,
            None,
            move |result: DebounceEventResult| {
                let events = result
                    .map(|events| events.into_iter().map(|e| e.event).collect())
                    .map_err(|errs| {
                        BlendlinkError::internal(format!("watch error: {:?}", errs))
                    });
                let _ = tx.send(events);
            },
        )
        .map_err(|e| BlendlinkError::internal(format!("Failed to create watcher: {}", e)))?;

        debouncer
            .watcher()
            .watch(project_root, RecursiveMode::Recursive)
            .map_err(|e| {
                BlendlinkError::internal(format!(
                    "Failed to watch {}: {}",
                    project_root.display(),
                    e
                ))
            })?;

        Ok(Self {
            project_root: project_root.to_path_buf(),
            rx,
            _debouncer: debouncer,
        })
    }

    /// Forward save events into the host loop until either side closes
    pub async fn run(mut self, events: mpsc::Sender<HostEvent>) {
        info!("save watcher started for {}", self.project_root.display());

        while let Some(result) = self.rx.recv().await {
            let batch = match result {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("save watcher error: {}", e);
                    continue;
                }
            };

            for event in batch {
                if !Self::is_save(&event) {
                    continue;
                }
                for path in event.paths {
                    if events.send(HostEvent::FileSaved(path)).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    fn is_save(event: &Event) -> bool {
        matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
    }
}
