//! Main watch manager that coordinates all file watching activities.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Error, Result},
    events::{EventFilter, FileEvent},
    handlers::HandlerRegistry,
    traits::{EventHandler, FileWatcher, WatchHandle},
};

/// Owns one watcher backend and feeds its events through the handlers.
///
/// Events are processed one at a time, in arrival order; each event visits
/// its handlers in priority order. Handler failures are logged and do not
/// stop processing.
pub struct WatchManager {
    watcher: Box<dyn FileWatcher>,
    handlers: Arc<RwLock<HandlerRegistry>>,
    filter: Arc<EventFilter>,
    processed: Arc<AtomicU64>,
    event_sender: Option<mpsc::UnboundedSender<FileEvent>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    processor_task: Option<JoinHandle<()>>,
}

impl WatchManager {
    pub fn new(watcher: Box<dyn FileWatcher>) -> Self {
        Self {
            watcher,
            handlers: Arc::new(RwLock::new(HandlerRegistry::new())),
            filter: Arc::new(EventFilter::new()),
            processed: Arc::new(AtomicU64::new(0)),
            event_sender: None,
            shutdown_tx: None,
            processor_task: None,
        }
    }

    /// Only events passing `filter` reach the handlers.
    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    pub fn is_running(&self) -> bool {
        self.processor_task.is_some()
    }

    /// Start processing events.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        info!("Starting watch manager");

        let (event_sender, mut events) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        self.watcher.set_event_sender(event_sender.clone());

        let handlers = Arc::clone(&self.handlers);
        let filter = Arc::clone(&self.filter);
        let processed = Arc::clone(&self.processed);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.recv() => {
                        // Whatever already arrived is still applied.
                        while let Ok(event) = events.try_recv() {
                            Self::process_event(event, &handlers, &filter, &processed).await;
                        }
                        info!("Event processor shutting down");
                        break;
                    }
                    Some(event) = events.recv() => {
                        Self::process_event(event, &handlers, &filter, &processed).await;
                    }
                }
            }
        });

        self.event_sender = Some(event_sender);
        self.shutdown_tx = Some(shutdown_tx);
        self.processor_task = Some(task);
        Ok(())
    }

    /// Stop watching and wait for queued events to be processed.
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(task) = self.processor_task.take() else {
            return Ok(());
        };
        info!("Shutting down watch manager");

        for handle in self.watcher.active_watches() {
            if let Err(e) = self.watcher.unwatch(handle).await {
                warn!("Failed to remove watch: {}", e);
            }
        }
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }
        self.event_sender = None;

        task.await
            .map_err(|e| Error::Channel(format!("event processor failed: {}", e)))
    }

    pub async fn add_watch(&mut self, path: PathBuf, recursive: bool) -> Result<WatchHandle> {
        if !self.is_running() {
            return Err(Error::NotRunning);
        }
        self.watcher.watch(path, recursive).await
    }

    pub async fn remove_watch(&mut self, handle: WatchHandle) -> Result<()> {
        self.watcher.unwatch(handle).await
    }

    pub async fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        info!("Registered event handler: {}", handler.name());
        self.handlers.write().await.register(handler);
    }

    pub async fn unregister_handler(&self, name: &str) -> bool {
        self.handlers.write().await.unregister(name)
    }

    /// Inject an event as if the backend had reported it.
    pub fn submit(&self, event: FileEvent) -> Result<()> {
        let sender = self.event_sender.as_ref().ok_or(Error::NotRunning)?;
        sender
            .send(event)
            .map_err(|e| Error::Channel(format!("event processor gone: {}", e)))
    }

    pub async fn status(&self) -> ManagerStatus {
        ManagerStatus {
            is_running: self.is_running(),
            backend: self.watcher.backend_type(),
            active_watches: self.watcher.active_watches().len(),
            registered_handlers: self.handlers.read().await.len(),
            events_processed: self.processed.load(Ordering::Relaxed),
        }
    }

    async fn process_event(
        event: FileEvent,
        handlers: &RwLock<HandlerRegistry>,
        filter: &EventFilter,
        processed: &AtomicU64,
    ) {
        if !filter.matches(&event) {
            debug!("Filtered out {} {}", event.kind.as_str(), event.path.display());
            return;
        }

        let matching = handlers.read().await.handlers_for(&event);
        for handler in matching {
            let start = std::time::Instant::now();
            match handler.handle(event.clone()).await {
                Ok(()) => debug!(
                    "Handler '{}' processed {} {} in {:?}",
                    handler.name(),
                    event.kind.as_str(),
                    event.path.display(),
                    start.elapsed()
                ),
                Err(e) => error!(
                    "Handler '{}' failed on {}: {}",
                    handler.name(),
                    event.path.display(),
                    e
                ),
            }
        }
        processed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Status information for the watch manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerStatus {
    pub is_running: bool,
    pub backend: &'static str,
    pub active_watches: usize,
    pub registered_handlers: usize,
    /// Events that passed the filter and visited their handlers
    pub events_processed: u64,
}
