//! Blockref Outline Parser
//!
//! Pure text processing for Logseq-style outline notes:
//! - Block extraction from `- content` bullets with `id::` properties
//! - Block reference scanning for `((uuid))` and `{{embed ((uuid))}}`
//! - Small line-level helpers used by editor commands (block lines, `((` triggers)
//!
//! Nothing in this crate performs I/O or keeps state between calls. Malformed
//! input degrades to fewer results, never to an error.

pub mod block_line;
pub mod block_parser;
pub mod references;
pub mod types;

pub use block_line::{parse_block_line, suggestion_trigger, BlockLine, SuggestTrigger};
pub use block_parser::{parse_blocks, BlockParser};
pub use references::{
    block_embed, block_reference, is_block_id, normalize_block_id, scan_references, scan_visible,
    ReferenceOccurrence,
};
pub use types::{BlockEntry, BlockRecord, ParsedFile};
