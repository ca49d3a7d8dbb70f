//! Outline block extraction
//!
//! Recovers the addressable blocks of one file from Logseq-style outline text:
//!
//! ```text
//! title:: Page properties are skipped
//!
//! - Parent block
//!   id:: 6f9619ff-8b86-d011-b42d-00cf4fc964ff
//!   collapsed:: true
//!   - Child block
//!     id:: 0b8f3a3e-2c1d-4f7a-9e3b-5d6c7a8b9c0d
//! ```
//!
//! The pass is single and line-oriented. Blocks are collected into an arena in
//! discovery order and parent→child edges are recorded as arena indices, because
//! a child's `id::` line only appears after the child has been linked. Edges are
//! resolved to ids once the whole file has been read.
//!
//! Indentation is lexical: the number of leading whitespace characters, with a
//! tab counting as one column like a space does.

use std::sync::LazyLock;

use regex::Regex;

use crate::references::{normalize_block_id, UUID_PATTERN};
use crate::types::{BlockRecord, ParsedFile};

/// `key:: value` line without a bullet. Only consulted before the first block.
static PAGE_PROPERTY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[^-\s].*?::\s*.*$").expect("page property regex"));

/// `<indentation>- <content>`
pub(crate) static BLOCK_START_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)-\s(.+)").expect("block start regex"));

static BLOCK_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(\s*)id::\s*({UUID_PATTERN})")).expect("block id regex")
});

static BLOCK_PROPERTY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)([^-\s].*?::\s*.*)$").expect("block property regex"));

/// A block discovered during the pass whose id and children are not final yet.
#[derive(Debug)]
struct PendingBlock {
    record: BlockRecord,
    indentation: usize,
    id: Option<String>,
    /// Arena indices of structural children.
    children: Vec<usize>,
}

/// Stateless outline block parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockParser;

impl BlockParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse `content` of the file at `file_path` into its addressable blocks.
    ///
    /// Only blocks that declare an `id::` on the line directly below their
    /// bullet are returned. Blocks without one still take part in the tree, so
    /// their own children resolve normally. Ids are returned lowercase.
    pub fn parse(&self, file_path: &str, content: &str) -> ParsedFile {
        let mut arena: Vec<PendingBlock> = Vec::new();
        let mut open: Vec<usize> = Vec::new();
        let mut in_page_properties = true;

        for (line_number, raw_line) in content.split('\n').enumerate() {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

            if in_page_properties {
                if line.trim().is_empty() || PAGE_PROPERTY_REGEX.is_match(line) {
                    continue;
                }
                in_page_properties = false;
            }

            if let Some(caps) = BLOCK_START_REGEX.captures(line) {
                let indentation = column_width(&caps[1]);

                while open
                    .last()
                    .is_some_and(|&top| arena[top].indentation >= indentation)
                {
                    open.pop();
                }

                let index = arena.len();
                if let Some(&parent) = open.last() {
                    arena[parent].children.push(index);
                }

                arena.push(PendingBlock {
                    record: BlockRecord::new(file_path, &caps[2], line_number),
                    indentation,
                    id: None,
                    children: Vec::new(),
                });
                open.push(index);
                continue;
            }

            // Any other line belongs to the most recently discovered block.
            let Some(owner) = arena.last_mut() else {
                continue;
            };

            if line_number == owner.record.start_line + 1 {
                if let Some(caps) = BLOCK_ID_REGEX.captures(line) {
                    if column_width(&caps[1]) > owner.indentation {
                        owner.id = Some(normalize_block_id(&caps[2]));
                        continue;
                    }
                }
            }

            if let Some(caps) = BLOCK_PROPERTY_REGEX.captures(line) {
                if column_width(&caps[1]) > owner.indentation {
                    owner.record.raw_content.push('\n');
                    owner.record.raw_content.push_str(line);
                }
            }
        }

        resolve(arena)
    }
}

/// Resolve arena edges into `childrenIDs` and keep only addressable blocks.
fn resolve(arena: Vec<PendingBlock>) -> ParsedFile {
    let children: Vec<Vec<String>> = arena
        .iter()
        .map(|block| {
            block
                .children
                .iter()
                .filter_map(|&child| arena[child].id.clone())
                .collect()
        })
        .collect();

    let mut parsed = ParsedFile::new();
    for (block, children_ids) in arena.into_iter().zip(children) {
        if let Some(id) = block.id {
            parsed.insert(id, block.record.with_children(children_ids));
        }
    }
    parsed
}

fn column_width(indentation: &str) -> usize {
    indentation.chars().count()
}

/// Parse one file with the default parser.
pub fn parse_blocks(file_path: &str, content: &str) -> ParsedFile {
    BlockParser::new().parse(file_path, content)
}
