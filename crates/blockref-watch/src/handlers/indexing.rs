//! Keeps the block index in step with the vault on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use blockref_core::{FsVault, IndexHandle};
use tracing::debug;

use crate::{
    error::Result,
    events::{FileEvent, FileEventKind},
    traits::EventHandler,
};

/// Forwards vault file events to the index service.
pub struct IndexingHandler {
    index: IndexHandle,
    vault: FsVault,
    /// Notify reports canonical paths; the configured root may not be.
    canonical_root: Option<PathBuf>,
}

impl IndexingHandler {
    pub fn new(index: IndexHandle, vault: FsVault) -> Self {
        let canonical_root = vault.root().canonicalize().ok();
        Self {
            index,
            vault,
            canonical_root,
        }
    }

    /// The vault-relative path of `path` when the index should contain it.
    fn indexed_path(&self, path: &Path) -> Option<String> {
        let relative = self
            .canonical_root
            .as_ref()
            .and_then(|root| path.strip_prefix(root).ok())
            .and_then(|relative| self.vault.relative(relative))
            .or_else(|| self.vault.relative(path))?;
        self.vault.is_indexed(&relative).then_some(relative)
    }
}

#[async_trait]
impl EventHandler for IndexingHandler {
    async fn handle(&self, event: FileEvent) -> Result<()> {
        match &event.kind {
            FileEventKind::Created | FileEventKind::Modified => {
                if let Some(path) = self.indexed_path(&event.path) {
                    let blocks = self.index.file_changed(path.as_str()).await?;
                    debug!("{} now holds {} blocks", path, blocks);
                }
            }
            FileEventKind::Deleted => {
                if let Some(path) = self.indexed_path(&event.path) {
                    self.index.file_deleted(path).await?;
                }
            }
            FileEventKind::Moved { from, to } => {
                match (self.indexed_path(from), self.indexed_path(to)) {
                    (Some(from), Some(to)) => {
                        self.index.file_renamed(from, to).await?;
                    }
                    (Some(from), None) => {
                        self.index.file_deleted(from).await?;
                    }
                    (None, Some(to)) => {
                        self.index.file_changed(to).await?;
                    }
                    (None, None) => {}
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "indexing"
    }

    fn priority(&self) -> u32 {
        200
    }

    fn can_handle(&self, event: &FileEvent) -> bool {
        !event.is_dir
    }
}
