//! Index service task
//!
//! All index mutations go through one tokio task, so a file event arriving
//! during a full rebuild is queued behind it instead of racing it. Reads do
//! not queue: handles share the index behind a `parking_lot::RwLock` and
//! only take the lock for the duration of a lookup.
//!
//! Snapshot writes are debounced inside the task loop. Every mutation re-arms
//! the deadline; a rebuild, `flush` or `shutdown` writes immediately.

use std::sync::Arc;
use std::time::Duration;

use blockref_config::IndexConfig;
use blockref_parser::{parse_blocks, BlockEntry, BlockRecord};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::BlockIndex;
use crate::debounce::Debouncer;
use crate::error::Result;
use crate::snapshot::{decode_snapshot, encode_snapshot, SnapshotStore};
use crate::vault::Vault;

const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Tunables for the index service
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub persist_debounce: Duration,
    /// Yield to the runtime after this many files during a rebuild
    pub rebuild_yield_every: usize,
    pub search_limit: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::from(&IndexConfig::default())
    }
}

impl From<&IndexConfig> for IndexOptions {
    fn from(config: &IndexConfig) -> Self {
        Self {
            persist_debounce: config.persist_debounce(),
            rebuild_yield_every: config.rebuild_yield_every.max(1),
            search_limit: config.search_limit,
        }
    }
}

/// Where the index came from at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitSource {
    Snapshot,
    Rebuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InitOutcome {
    pub source: InitSource,
    pub blocks: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub blocks: usize,
    pub files: usize,
    /// Bumped after every mutation
    pub generation: u64,
    pub last_rebuilt: Option<DateTime<Utc>>,
    pub last_persisted: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct IndexMeta {
    last_rebuilt: Option<DateTime<Utc>>,
    last_persisted: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum IndexCommand {
    Initialize {
        reply: oneshot::Sender<InitOutcome>,
    },
    Rebuild {
        reply: oneshot::Sender<Result<usize>>,
    },
    FileChanged {
        path: String,
        reply: oneshot::Sender<Result<usize>>,
    },
    FileDeleted {
        path: String,
        reply: oneshot::Sender<usize>,
    },
    FileRenamed {
        from: String,
        to: String,
        reply: oneshot::Sender<usize>,
    },
    AddBlock {
        id: String,
        block: BlockRecord,
        reply: oneshot::Sender<()>,
    },
    Flush {
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// The task that owns every index mutation.
pub struct IndexService {
    vault: Arc<dyn Vault>,
    store: Arc<dyn SnapshotStore>,
    options: IndexOptions,
    index: Arc<RwLock<BlockIndex>>,
    meta: Arc<RwLock<IndexMeta>>,
    generation: watch::Sender<u64>,
    persist: Debouncer,
    commands: mpsc::Receiver<IndexCommand>,
}

impl IndexService {
    /// Start the service on the current runtime and return a handle to it.
    ///
    /// The task stops when [`IndexHandle::shutdown`] is called or the last
    /// handle is dropped; a pending snapshot write is flushed either way.
    pub fn spawn(
        vault: Arc<dyn Vault>,
        store: Arc<dyn SnapshotStore>,
        options: IndexOptions,
    ) -> IndexHandle {
        let (tx, commands) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (generation, generation_rx) = watch::channel(0);
        let index = Arc::new(RwLock::new(BlockIndex::new()));
        let meta = Arc::new(RwLock::new(IndexMeta::default()));

        let service = Self {
            vault,
            store,
            persist: Debouncer::new(options.persist_debounce),
            options: options.clone(),
            index: index.clone(),
            meta: meta.clone(),
            generation,
            commands,
        };
        let task = tokio::spawn(service.run());

        IndexHandle {
            commands: tx,
            index,
            meta,
            generation: generation_rx,
            search_limit: options.search_limit,
            task: Arc::new(parking_lot::Mutex::new(Some(task))),
        }
    }

    async fn run(mut self) {
        debug!("Index service started");
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle(command).await {
                            break;
                        }
                    }
                    None => {
                        if let Err(e) = self.flush().await {
                            warn!("Failed to persist block index on close: {}", e);
                        }
                        break;
                    }
                },
                _ = self.persist.fired() => {
                    if let Err(e) = self.persist_now().await {
                        warn!("Failed to persist block index: {}", e);
                    }
                }
            }
        }
        debug!("Index service stopped");
    }

    /// Apply one command. Returns `false` once the service should stop.
    async fn handle(&mut self, command: IndexCommand) -> bool {
        match command {
            IndexCommand::Initialize { reply } => {
                let _ = reply.send(self.initialize().await);
            }
            IndexCommand::Rebuild { reply } => {
                let _ = reply.send(self.rebuild().await);
            }
            IndexCommand::FileChanged { path, reply } => {
                let _ = reply.send(self.file_changed(&path).await);
            }
            IndexCommand::FileDeleted { path, reply } => {
                let removed = self.index.write().remove_file(&path);
                debug!("Removed {} blocks of deleted file {}", removed, path);
                self.mutated();
                let _ = reply.send(removed);
            }
            IndexCommand::FileRenamed { from, to, reply } => {
                let moved = self.index.write().rename_file(&from, &to);
                debug!("Moved {} blocks from {} to {}", moved, from, to);
                self.mutated();
                let _ = reply.send(moved);
            }
            IndexCommand::AddBlock { id, block, reply } => {
                debug!("Adding block {} at {}:{}", id, block.file_path, block.start_line);
                self.index.write().insert(id, block);
                self.mutated();
                let _ = reply.send(());
            }
            IndexCommand::Flush { reply } => {
                let _ = reply.send(self.flush().await);
            }
            IndexCommand::Shutdown { reply } => {
                let _ = reply.send(self.flush().await);
                return false;
            }
        }
        true
    }

    /// Load the snapshot, falling back to a full rebuild.
    async fn initialize(&mut self) -> InitOutcome {
        match self.load_snapshot().await {
            Ok(Some(index)) => {
                let blocks = index.len();
                *self.index.write() = index;
                self.bump_generation();
                info!("Loaded {} blocks from snapshot", blocks);
                return InitOutcome {
                    source: InitSource::Snapshot,
                    blocks,
                };
            }
            Ok(None) => debug!("No block index snapshot, rebuilding"),
            Err(e) => warn!("Failed to load block index snapshot, rebuilding: {}", e),
        }

        let blocks = match self.rebuild().await {
            Ok(blocks) => blocks,
            Err(e) => {
                error!("Initial block index rebuild failed: {}", e);
                self.index.read().len()
            }
        };
        InitOutcome {
            source: InitSource::Rebuild,
            blocks,
        }
    }

    async fn load_snapshot(&self) -> Result<Option<BlockIndex>> {
        if !self.store.exists().await? {
            return Ok(None);
        }
        let data = self.store.read().await?;
        Ok(Some(BlockIndex::from_entries(decode_snapshot(&data)?)))
    }

    /// Reparse the whole vault into a fresh index and swap it in.
    async fn rebuild(&mut self) -> Result<usize> {
        info!("Rebuilding block index");
        let files = self.vault.list_files().await?;

        let mut fresh = BlockIndex::new();
        for (n, path) in files.iter().enumerate() {
            match self.vault.read(path).await {
                Ok(content) => {
                    fresh.replace_file(path, parse_blocks(path, &content));
                }
                Err(e) => warn!("Skipping unreadable file {}: {}", path, e),
            }
            if (n + 1) % self.options.rebuild_yield_every == 0 {
                tokio::task::yield_now().await;
            }
        }

        let blocks = fresh.len();
        *self.index.write() = fresh;
        self.meta.write().last_rebuilt = Some(Utc::now());
        self.bump_generation();
        info!("Indexed {} blocks from {} files", blocks, files.len());

        self.persist.cancel();
        if let Err(e) = self.persist_now().await {
            warn!("Failed to persist rebuilt block index: {}", e);
        }
        Ok(blocks)
    }

    async fn file_changed(&mut self, path: &str) -> Result<usize> {
        let result = match self.vault.read(path).await {
            Ok(content) => {
                let parsed = parse_blocks(path, &content);
                let count = self.index.write().replace_file(path, parsed);
                debug!("Reindexed {} blocks in {}", count, path);
                Ok(count)
            }
            Err(e) => {
                // The file is gone or unreadable; its old blocks are stale either way.
                warn!("Failed to read changed file {}: {}", path, e);
                self.index.write().remove_file(path);
                Err(e)
            }
        };
        self.mutated();
        result
    }

    fn mutated(&mut self) {
        self.bump_generation();
        self.persist.trigger();
    }

    fn bump_generation(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }

    async fn flush(&mut self) -> Result<()> {
        if !self.persist.is_pending() {
            return Ok(());
        }
        self.persist.cancel();
        self.persist_now().await
    }

    async fn persist_now(&self) -> Result<()> {
        let entries = self.index.read().entries();
        let data = encode_snapshot(&entries)?;
        self.store.write(&data).await?;
        self.meta.write().last_persisted = Some(Utc::now());
        debug!("Persisted {} blocks", entries.len());
        Ok(())
    }
}

/// Cheap, cloneable access to a running [`IndexService`].
#[derive(Clone)]
pub struct IndexHandle {
    commands: mpsc::Sender<IndexCommand>,
    index: Arc<RwLock<BlockIndex>>,
    meta: Arc<RwLock<IndexMeta>>,
    generation: watch::Receiver<u64>,
    search_limit: usize,
    task: Arc<parking_lot::Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("blocks", &self.index.read().len())
            .field("search_limit", &self.search_limit)
            .finish()
    }
}

impl IndexHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> IndexCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await?;
        Ok(response.await?)
    }

    /// Load the snapshot, or rebuild when it is missing or unreadable.
    pub async fn initialize(&self) -> Result<InitOutcome> {
        self.request(|reply| IndexCommand::Initialize { reply }).await
    }

    /// Reparse every vault file. Returns the number of indexed blocks.
    pub async fn rebuild(&self) -> Result<usize> {
        self.request(|reply| IndexCommand::Rebuild { reply }).await?
    }

    /// Reparse one file. Returns the number of blocks it now holds.
    pub async fn file_changed(&self, path: impl Into<String>) -> Result<usize> {
        let path = path.into();
        self.request(|reply| IndexCommand::FileChanged { path, reply })
            .await?
    }

    /// Forget one file. Returns the number of removed blocks.
    pub async fn file_deleted(&self, path: impl Into<String>) -> Result<usize> {
        let path = path.into();
        self.request(|reply| IndexCommand::FileDeleted { path, reply })
            .await
    }

    /// Move one file's blocks to a new path. Returns the number moved.
    pub async fn file_renamed(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<usize> {
        let (from, to) = (from.into(), to.into());
        self.request(|reply| IndexCommand::FileRenamed { from, to, reply })
            .await
    }

    /// Insert one block ahead of the file event that will confirm it.
    pub async fn add_block(&self, id: impl Into<String>, block: BlockRecord) -> Result<()> {
        let id = id.into();
        self.request(|reply| IndexCommand::AddBlock { id, block, reply })
            .await
    }

    /// Write a pending snapshot now.
    pub async fn flush(&self) -> Result<()> {
        self.request(|reply| IndexCommand::Flush { reply }).await?
    }

    /// Flush and stop the service, waiting for the task to finish.
    pub async fn shutdown(&self) -> Result<()> {
        let result = self.request(|reply| IndexCommand::Shutdown { reply }).await?;
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Index service task failed: {}", e);
            }
        }
        result
    }

    pub fn get_block(&self, id: &str) -> Option<BlockRecord> {
        self.index.read().get(id).cloned()
    }

    pub fn search_blocks(&self, query: &str) -> Vec<BlockEntry> {
        self.index.read().search(query, self.search_limit)
    }

    pub fn find_block_by_file_and_line(&self, path: &str, line: usize) -> Option<BlockEntry> {
        self.index.read().find_by_file_and_line(path, line)
    }

    /// Current index contents in iteration order.
    pub fn entries(&self) -> Vec<(String, BlockRecord)> {
        self.index.read().entries()
    }

    pub fn stats(&self) -> IndexStats {
        let (blocks, files) = {
            let index = self.index.read();
            (index.len(), index.file_count())
        };
        let meta = self.meta.read();
        IndexStats {
            blocks,
            files,
            generation: *self.generation.borrow(),
            last_rebuilt: meta.last_rebuilt,
            last_persisted: meta.last_persisted,
        }
    }

    /// A receiver that observes every index mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}
