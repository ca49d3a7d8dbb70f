//! Block record types shared by the parser and the index.

use serde::{Deserialize, Serialize};

/// One outline bullet and its property continuation lines.
///
/// Field names are preserved verbatim in the serialized form so that cache
/// snapshots stay readable by other tools working on the same vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Vault-relative path of the owning file.
    #[serde(rename = "filePath")]
    pub file_path: String,

    /// Bullet text, followed by any newline-joined property lines.
    #[serde(rename = "rawContent")]
    pub raw_content: String,

    /// 0-indexed line of the bullet within its file.
    #[serde(rename = "startLine")]
    pub start_line: usize,

    /// Ids of direct children that declared an `id::` property, in document order.
    #[serde(rename = "childrenIDs", default)]
    pub children_ids: Vec<String>,
}

impl BlockRecord {
    /// Create a record with no children.
    pub fn new(file_path: impl Into<String>, raw_content: impl Into<String>, start_line: usize) -> Self {
        Self {
            file_path: file_path.into(),
            raw_content: raw_content.into(),
            start_line,
            children_ids: Vec::new(),
        }
    }

    /// Builder-style: set the child ids
    #[must_use]
    pub fn with_children(mut self, children_ids: Vec<String>) -> Self {
        self.children_ids = children_ids;
        self
    }
}

/// A block together with its id, as returned by lookups and searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub id: String,
    pub block: BlockRecord,
}

impl BlockEntry {
    pub fn new(id: impl Into<String>, block: BlockRecord) -> Self {
        Self {
            id: id.into(),
            block,
        }
    }
}

/// Addressable blocks of a single file, in document order.
///
/// Ids are unique within the file: when a file declares the same id twice the
/// later block replaces the earlier one but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFile {
    entries: Vec<BlockEntry>,
}

impl ParsedFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the block for `id`.
    pub fn insert(&mut self, id: String, block: BlockRecord) {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(existing) => existing.block = block,
            None => self.entries.push(BlockEntry { id, block }),
        }
    }

    pub fn get(&self, id: &str) -> Option<&BlockRecord> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| &entry.block)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.id.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BlockEntry> {
        self.entries.iter()
    }
}

impl IntoIterator for ParsedFile {
    type Item = BlockEntry;
    type IntoIter = std::vec::IntoIter<BlockEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a ParsedFile {
    type Item = &'a BlockEntry;
    type IntoIter = std::slice::Iter<'a, BlockEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
