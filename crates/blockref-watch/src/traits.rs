//! Core traits for the file watching system.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{error::Result, events::FileEvent};

/// A source of file events.
#[async_trait]
pub trait FileWatcher: Send + Sync {
    /// Get the backend type identifier.
    fn backend_type(&self) -> &'static str;

    /// Set the event sender for this watcher.
    /// This must be called before adding any watches.
    fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<FileEvent>);

    /// Start watching `path`.
    async fn watch(&mut self, path: PathBuf, recursive: bool) -> Result<WatchHandle>;

    /// Stop watching the path behind `handle`.
    async fn unwatch(&mut self, handle: WatchHandle) -> Result<()>;

    fn active_watches(&self) -> Vec<WatchHandle>;
}

/// Handle to an active watch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchHandle {
    pub id: String,
    pub path: PathBuf,
}

impl WatchHandle {
    pub fn new(path: PathBuf) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path,
        }
    }
}

/// Something that reacts to file events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle a single file event.
    async fn handle(&self, event: FileEvent) -> Result<()>;

    fn name(&self) -> &'static str;

    /// Higher runs first.
    fn priority(&self) -> u32 {
        100
    }

    /// Check if this handler can process the given event.
    fn can_handle(&self, _event: &FileEvent) -> bool {
        true
    }
}
