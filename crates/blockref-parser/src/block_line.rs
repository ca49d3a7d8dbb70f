//! Single-line helpers for editor commands.

use std::sync::LazyLock;

use regex::Regex;

use crate::block_parser::BLOCK_START_REGEX;

/// Unterminated `((` before the cursor.
static SUGGEST_TRIGGER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\(([^)]*)$").expect("suggest trigger regex"));

/// A bullet line split into indentation and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLine {
    pub indent: String,
    pub content: String,
}

/// Parse `line` as `<indent>- <content>`, or `None` when it is not a bullet.
pub fn parse_block_line(line: &str) -> Option<BlockLine> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let caps = BLOCK_START_REGEX.captures(line)?;
    Some(BlockLine {
        indent: caps[1].to_string(),
        content: caps[2].to_string(),
    })
}

/// An autocomplete trigger found in the text before the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestTrigger {
    /// Byte column of the opening `((`.
    pub start: usize,
    /// Text typed after `((` so far.
    pub query: String,
}

/// Detect an open `((` in `line_prefix` (the line up to the cursor).
pub fn suggestion_trigger(line_prefix: &str) -> Option<SuggestTrigger> {
    let caps = SUGGEST_TRIGGER_REGEX.captures(line_prefix)?;
    let whole = caps.get(0)?;
    Some(SuggestTrigger {
        start: whole.start(),
        query: caps[1].to_string(),
    })
}
