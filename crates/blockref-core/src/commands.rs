//! User-facing commands built on the index: copying a block reference and
//! `((` autocomplete.

use blockref_parser::{block_reference, parse_block_line, parse_blocks, BlockRecord};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{IndexError, Result};
use crate::index::IndexHandle;

const PREVIEW_CHARS: usize = 100;

/// Text to insert into the file so that a block gets its new id line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdInsertion {
    /// Byte offset in the file text (end of the bullet line).
    pub offset: usize,
    pub text: String,
}

impl IdInsertion {
    /// `text` with the insertion applied.
    pub fn apply(&self, text: &str) -> String {
        let mut updated = String::with_capacity(text.len() + self.text.len());
        updated.push_str(&text[..self.offset]);
        updated.push_str(&self.text);
        updated.push_str(&text[self.offset..]);
        updated
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopiedReference {
    pub id: String,
    /// `((id))`, ready for the clipboard
    pub reference: String,
    /// Present when a new id was generated.
    pub insertion: Option<IdInsertion>,
}

/// Produce the reference for the bullet on `line` of `file_path`.
///
/// An id already known to the index, or already present in `text`, is reused.
/// Otherwise a new v4 id is generated, the block is added to the index ahead
/// of the file event, and the id line to insert is returned.
pub async fn copy_block_reference(
    index: &IndexHandle,
    file_path: &str,
    text: &str,
    line: usize,
) -> Result<CopiedReference> {
    let (line_start, line_text) = locate_line(text, line).ok_or(IndexError::InvalidBlockLine { line })?;
    let block_line = parse_block_line(line_text).ok_or(IndexError::InvalidBlockLine { line })?;

    let existing = index
        .find_block_by_file_and_line(file_path, line)
        .map(|entry| entry.id)
        .or_else(|| {
            parse_blocks(file_path, text)
                .into_iter()
                .find(|entry| entry.block.start_line == line)
                .map(|entry| entry.id)
        });
    if let Some(id) = existing {
        debug!("Reusing block id {} at {}:{}", id, file_path, line);
        return Ok(CopiedReference {
            reference: block_reference(&id),
            id,
            insertion: None,
        });
    }

    let id = Uuid::new_v4().to_string();
    let insertion = IdInsertion {
        offset: line_start + line_text.trim_end_matches('\r').len(),
        text: format!("\n{}  id:: {}", block_line.indent, id),
    };
    index
        .add_block(id.clone(), BlockRecord::new(file_path, block_line.content, line))
        .await?;
    debug!("Generated block id {} at {}:{}", id, file_path, line);

    Ok(CopiedReference {
        reference: block_reference(&id),
        id,
        insertion: Some(insertion),
    })
}

/// Byte offset and text of the 0-indexed `line`.
fn locate_line(text: &str, line: usize) -> Option<(usize, &str)> {
    let mut offset = 0;
    for (n, current) in text.split('\n').enumerate() {
        if n == line {
            return Some((offset, current));
        }
        offset += current.len() + 1;
    }
    None
}

/// One autocomplete candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSuggestion {
    pub id: String,
    /// First 100 characters of the block content
    pub preview: String,
    pub file_path: String,
}

/// Blocks matching `query`, in search order.
pub fn suggest(index: &IndexHandle, query: &str) -> Vec<BlockSuggestion> {
    index
        .search_blocks(query)
        .into_iter()
        .map(|entry| BlockSuggestion {
            preview: entry.block.raw_content.chars().take(PREVIEW_CHARS).collect(),
            file_path: entry.block.file_path,
            id: entry.id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_line() {
        let text = "- a\r\n- b\n\n- c";
        assert_eq!(locate_line(text, 0), Some((0, "- a\r")));
        assert_eq!(locate_line(text, 1), Some((5, "- b")));
        assert_eq!(locate_line(text, 3), Some((10, "- c")));
        assert_eq!(locate_line(text, 4), None);
    }

    #[test]
    fn test_insertion_apply() {
        let insertion = IdInsertion {
            offset: 3,
            text: "\n  id:: x".to_string(),
        };
        assert_eq!(insertion.apply("- a\n- b"), "- a\n  id:: x\n- b");
    }
}
