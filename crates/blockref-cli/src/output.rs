//! Text and JSON rendering of command results.

use anyhow::Result;
use blockref_core::{BlockEntry, BlockRecord, BlockSuggestion, IndexStats};
use serde::Serialize;

const SNIPPET_CHARS: usize = 80;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// First line of `content`, cut to a readable width.
pub fn snippet(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or_default();
    let mut snippet: String = first_line.chars().take(SNIPPET_CHARS).collect();
    if first_line.chars().count() > SNIPPET_CHARS || content.contains('\n') {
        snippet.push('…');
    }
    snippet
}

pub fn format_block(id: &str, block: &BlockRecord) -> String {
    let mut out = format!(
        "(({id}))\n  file: {}:{}\n",
        block.file_path,
        block.start_line + 1
    );
    if !block.children_ids.is_empty() {
        out.push_str(&format!("  children: {}\n", block.children_ids.join(", ")));
    }
    out.push('\n');
    for line in block.raw_content.lines() {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out
}

pub fn format_entries(entries: &[BlockEntry]) -> String {
    if entries.is_empty() {
        return "No matching blocks\n".to_string();
    }
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}  {}:{}  {}\n",
                entry.id,
                entry.block.file_path,
                entry.block.start_line + 1,
                snippet(&entry.block.raw_content)
            )
        })
        .collect()
}

pub fn format_suggestions(suggestions: &[BlockSuggestion]) -> String {
    if suggestions.is_empty() {
        return "No suggestions\n".to_string();
    }
    suggestions
        .iter()
        .map(|s| format!("(({}))  {}  {}\n", s.id, s.file_path, snippet(&s.preview)))
        .collect()
}

pub fn format_stats(stats: &IndexStats) -> String {
    let never = || "never".to_string();
    format!(
        "Blocks:          {}\nFiles:           {}\nGeneration:      {}\nLast rebuilt:    {}\nLast persisted:  {}\n",
        stats.blocks,
        stats.files,
        stats.generation,
        stats.last_rebuilt.map(|t| t.to_rfc3339()).unwrap_or_else(never),
        stats.last_persisted.map(|t| t.to_rfc3339()).unwrap_or_else(never),
    )
}
