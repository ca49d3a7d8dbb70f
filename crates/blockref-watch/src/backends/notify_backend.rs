//! Notify-based file watching backend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{
    new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer, RecommendedCache,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::{
    error::{Error, Result},
    events::{FileEvent, FileEventKind},
    traits::{FileWatcher, WatchHandle},
};

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Debounced OS notifications through `notify`.
///
/// The file-id cache lets the debouncer stitch the two halves of a rename
/// together, so renames inside the watched tree arrive as one `Moved` event.
pub struct NotifyWatcher {
    debounce: Duration,
    debouncer: Option<Debouncer<RecommendedWatcher, RecommendedCache>>,
    event_sender: Option<mpsc::UnboundedSender<FileEvent>>,
    watches: HashMap<PathBuf, WatchHandle>,
}

impl NotifyWatcher {
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            debounce,
            debouncer: None,
            event_sender: None,
            watches: HashMap::new(),
        }
    }

    fn initialize(&mut self) -> Result<()> {
        let sender = self
            .event_sender
            .clone()
            .ok_or_else(|| Error::Channel("event sender not set before watch".to_string()))?;

        let debouncer = new_debouncer(self.debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events {
                        for file_event in convert_notify_event(event) {
                            if let Err(e) = sender.send(file_event) {
                                error!("Failed to send file event: {}", e);
                            }
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        error!("Notify error: {:?}", error);
                    }
                }
            }
        })
        .map_err(|e| Error::Watch(format!("Failed to create notify watcher: {}", e)))?;

        self.debouncer = Some(debouncer);
        info!("Notify watcher initialized with {:?} debounce", self.debounce);
        Ok(())
    }
}

impl Default for NotifyWatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate one debounced notify event into zero or more file events.
pub(crate) fn convert_notify_event(event: DebouncedEvent) -> Vec<FileEvent> {
    let paths = event.event.paths;
    let single = |kind: FileEventKind| -> Vec<FileEvent> {
        paths
            .iter()
            .map(|path| FileEvent::new(kind.clone(), path.clone()))
            .collect()
    };

    match event.event.kind {
        EventKind::Create(_) => single(FileEventKind::Created),
        EventKind::Remove(_) => single(FileEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both if paths.len() >= 2 => {
                vec![FileEvent::moved(paths[0].clone(), paths[1].clone())]
            }
            RenameMode::From => single(FileEventKind::Deleted),
            RenameMode::To => single(FileEventKind::Created),
            _ => paths
                .iter()
                .map(|path| {
                    let kind = if path.exists() {
                        FileEventKind::Created
                    } else {
                        FileEventKind::Deleted
                    };
                    FileEvent::new(kind, path.clone())
                })
                .collect(),
        },
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => single(FileEventKind::Modified),
        other => {
            trace!("Ignoring notify event {:?}", other);
            Vec::new()
        }
    }
}

#[async_trait]
impl FileWatcher for NotifyWatcher {
    fn backend_type(&self) -> &'static str {
        "notify"
    }

    fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<FileEvent>) {
        self.event_sender = Some(sender);
    }

    async fn watch(&mut self, path: PathBuf, recursive: bool) -> Result<WatchHandle> {
        debug!("Adding watch for: {}", path.display());

        if self.debouncer.is_none() {
            self.initialize()?;
        }
        if let Some(debouncer) = self.debouncer.as_mut() {
            let mode = if recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            debouncer.watch(&path, mode)?;
        }

        let handle = WatchHandle::new(path.clone());
        self.watches.insert(path, handle.clone());
        info!("Watching {}", handle.path.display());
        Ok(handle)
    }

    async fn unwatch(&mut self, handle: WatchHandle) -> Result<()> {
        if self.watches.remove(&handle.path).is_none() {
            return Err(Error::Watch(format!(
                "no watch for {}",
                handle.path.display()
            )));
        }
        if let Some(debouncer) = self.debouncer.as_mut() {
            debouncer.unwatch(&handle.path)?;
        }
        info!("Stopped watching {}", handle.path.display());
        Ok(())
    }

    fn active_watches(&self) -> Vec<WatchHandle> {
        self.watches.values().cloned().collect()
    }
}
