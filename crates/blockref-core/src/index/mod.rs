//! The vault-wide block index
//!
//! [`BlockIndex`] is the plain data structure: id → record, plus a per-file
//! list of ids in document order. [`service`] wraps it in a task that owns all
//! mutations and hands out cheap [`IndexHandle`]s.
//!
//! Iteration order (search, file+line lookup, snapshots) is files in path
//! order, then blocks in document order within each file.

pub mod service;

use std::collections::{BTreeMap, HashMap};

use blockref_parser::{normalize_block_id, BlockEntry, BlockRecord, ParsedFile};

pub use service::{IndexHandle, IndexOptions, IndexService, IndexStats, InitOutcome, InitSource};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockIndex {
    blocks: HashMap<String, BlockRecord>,
    files: BTreeMap<String, Vec<String>>,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from `(id, record)` pairs, e.g. a decoded snapshot.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, BlockRecord)>) -> Self {
        let mut index = Self::new();
        for (id, block) in entries {
            index.insert(id, block);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of files that own at least one block.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn get(&self, id: &str) -> Option<&BlockRecord> {
        match self.blocks.get(id) {
            Some(block) => Some(block),
            None => self.blocks.get(&normalize_block_id(id)),
        }
    }

    /// Insert or overwrite one block, returning the record it replaced.
    ///
    /// An id already owned by another file moves to the new record's file.
    pub fn insert(&mut self, id: String, block: BlockRecord) -> Option<BlockRecord> {
        let id = normalize_block_id(&id);
        let path = block.file_path.clone();
        let previous = self.blocks.insert(id.clone(), block);

        match &previous {
            Some(old) if old.file_path == path => {}
            Some(old) => {
                let old_path = old.file_path.clone();
                self.detach(&old_path, &id);
                self.files.entry(path).or_default().push(id);
            }
            None => self.files.entry(path).or_default().push(id),
        }
        previous
    }

    /// Remove every block owned by `path`, returning how many were removed.
    pub fn remove_file(&mut self, path: &str) -> usize {
        let Some(ids) = self.files.remove(path) else {
            return 0;
        };
        for id in &ids {
            self.blocks.remove(id);
        }
        ids.len()
    }

    /// Replace the blocks of `path` with a fresh parse of that file.
    pub fn replace_file(&mut self, path: &str, parsed: ParsedFile) -> usize {
        self.remove_file(path);
        let count = parsed.len();
        for entry in parsed {
            self.insert(entry.id, entry.block);
        }
        count
    }

    /// Move every block of `from` to `to`, keeping ids and content.
    ///
    /// Blocks previously owned by `to` are dropped, since that file was
    /// replaced by the rename.
    pub fn rename_file(&mut self, from: &str, to: &str) -> usize {
        if from == to {
            return self.files.get(from).map_or(0, Vec::len);
        }
        let Some(ids) = self.files.remove(from) else {
            return 0;
        };
        self.remove_file(to);

        for id in &ids {
            if let Some(block) = self.blocks.get_mut(id) {
                block.file_path = to.to_string();
            }
        }
        let count = ids.len();
        self.files.insert(to.to_string(), ids);
        count
    }

    /// Case-insensitive substring search over `rawContent`.
    ///
    /// An empty query matches nothing.
    pub fn search(&self, query: &str, limit: usize) -> Vec<BlockEntry> {
        if query.is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        self.iter()
            .filter(|(_, block)| block.raw_content.to_lowercase().contains(&needle))
            .take(limit)
            .map(|(id, block)| BlockEntry::new(id, block.clone()))
            .collect()
    }

    /// The first block of `path` whose bullet is on `line`.
    pub fn find_by_file_and_line(&self, path: &str, line: usize) -> Option<BlockEntry> {
        self.files
            .get(path)?
            .iter()
            .filter_map(|id| self.blocks.get(id).map(|block| (id, block)))
            .find(|(_, block)| block.start_line == line)
            .map(|(id, block)| BlockEntry::new(id.as_str(), block.clone()))
    }

    /// Ids owned by `path`, in document order.
    pub fn ids_in_file(&self, path: &str) -> &[String] {
        self.files.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BlockRecord)> {
        self.files.values().flatten().filter_map(|id| {
            self.blocks
                .get(id)
                .map(|block| (id.as_str(), block))
        })
    }

    /// Owned `(id, record)` pairs in iteration order, the snapshot payload.
    pub fn entries(&self) -> Vec<(String, BlockRecord)> {
        self.iter()
            .map(|(id, block)| (id.to_string(), block.clone()))
            .collect()
    }

    fn detach(&mut self, path: &str, id: &str) {
        if let Some(ids) = self.files.get_mut(path) {
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                self.files.remove(path);
            }
        }
    }
}
