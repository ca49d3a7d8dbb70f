//! Persistence of the block index between runs.
//!
//! The snapshot is a JSON list of `[id, record]` pairs in index iteration
//! order:
//!
//! ```json
//! [["6f9619ff-8b86-d011-b42d-00cf4fc964ff",
//!   {"filePath": "page.md", "rawContent": "First block", "startLine": 0, "childrenIDs": []}]]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use blockref_parser::BlockRecord;
use parking_lot::Mutex;

use crate::error::{IndexError, Result};

/// Encode index entries into the snapshot format.
pub fn encode_snapshot(entries: &[(String, BlockRecord)]) -> Result<String> {
    Ok(serde_json::to_string(entries)?)
}

/// Decode the snapshot format back into index entries.
pub fn decode_snapshot(data: &str) -> Result<Vec<(String, BlockRecord)>> {
    Ok(serde_json::from_str(data)?)
}

/// The single persistence slot the index is saved into.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn exists(&self) -> Result<bool>;
    async fn read(&self) -> Result<String>;
    async fn write(&self, data: &str) -> Result<()>;
}

/// A snapshot file on disk.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// readers only ever see a complete snapshot.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn error(&self, action: &str, e: std::io::Error) -> IndexError {
        IndexError::Snapshot(format!("failed to {action} {}: {e}", self.path.display()))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn exists(&self) -> Result<bool> {
        tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| self.error("check", e))
    }

    async fn read(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.error("read", e))
    }

    async fn write(&self, data: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error("create directory for", e))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, data)
            .await
            .map_err(|e| self.error("write", e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.error("replace", e))
    }
}

/// An in-memory slot that also counts writes.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    inner: Arc<Mutex<MemorySlot>>,
}

#[derive(Debug, Default)]
struct MemorySlot {
    data: Option<String>,
    writes: usize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot that already holds `data`.
    pub fn with_data(data: impl Into<String>) -> Self {
        let store = Self::default();
        store.inner.lock().data = Some(data.into());
        store
    }

    pub fn data(&self) -> Option<String> {
        self.inner.lock().data.clone()
    }

    /// Number of completed writes.
    pub fn write_count(&self) -> usize {
        self.inner.lock().writes
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn exists(&self) -> Result<bool> {
        Ok(self.inner.lock().data.is_some())
    }

    async fn read(&self) -> Result<String> {
        self.data()
            .ok_or_else(|| IndexError::Snapshot("no snapshot stored".to_string()))
    }

    async fn write(&self, data: &str) -> Result<()> {
        let mut slot = self.inner.lock();
        slot.data = Some(data.to_string());
        slot.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_format_uses_pairs() {
        let entries = vec![(
            "id-1".to_string(),
            BlockRecord::new("page.md", "First block", 0),
        )];
        let encoded = encode_snapshot(&entries).unwrap();

        assert_eq!(
            encoded,
            r#"[["id-1",{"filePath":"page.md","rawContent":"First block","startLine":0,"childrenIDs":[]}]]"#
        );
        assert_eq!(decode_snapshot(&encoded).unwrap(), entries);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_snapshot("{not json"), Err(IndexError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_file_store_creates_parent_and_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path().join("cache/blocks.json"));

        assert!(!store.exists().await.unwrap());
        store.write("[]").await.unwrap();
        store.write("[[\"a\",{}]]").await.unwrap();

        assert!(store.exists().await.unwrap());
        assert_eq!(store.read().await.unwrap(), "[[\"a\",{}]]");
        assert!(!temp_dir.path().join("cache/blocks.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_memory_store_counts_writes() {
        let store = MemorySnapshotStore::new();
        assert!(!store.exists().await.unwrap());
        assert!(store.read().await.is_err());

        store.write("[]").await.unwrap();
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.data().as_deref(), Some("[]"));
    }
}
