//! Block reference scanning
//!
//! Finds `((uuid))` references and `{{embed ((uuid))}}` embeds in a text
//! buffer. Only canonical 8-4-4-4-12 hex ids are recognized (any case); ids
//! are reported lowercase. Offsets are UTF-8 byte offsets.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Canonical hyphenated uuid, case-insensitive.
pub(crate) const UUID_PATTERN: &str =
    r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

static EMBED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\{{\{{embed\s+\(\(({UUID_PATTERN})\)\)\}}\}}")).expect("embed regex")
});

static REFERENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\(\(({UUID_PATTERN})\)\)")).expect("reference regex")
});

static BLOCK_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^{UUID_PATTERN}$")).expect("block id regex"));

/// A located reference inside a specific buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceOccurrence {
    /// Start of the whole reference syntax, inclusive.
    pub from: usize,
    /// End of the whole reference syntax, exclusive.
    pub to: usize,
    pub uuid: String,
    pub is_embed: bool,
}

impl ReferenceOccurrence {
    pub fn span(&self) -> Range<usize> {
        self.from..self.to
    }
}

/// Scan `text` for references, reporting offsets shifted by `base_offset`.
///
/// Embeds win over bare references: a bare match inside an embed span is
/// discarded. The result is ordered by `from`.
pub fn scan_references(text: &str, base_offset: usize) -> Vec<ReferenceOccurrence> {
    let mut occurrences: Vec<ReferenceOccurrence> = EMBED_REGEX
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(ReferenceOccurrence {
                from: whole.start(),
                to: whole.end(),
                uuid: normalize_block_id(caps.get(1)?.as_str()),
                is_embed: true,
            })
        })
        .collect();

    let embed_spans: Vec<Range<usize>> = occurrences.iter().map(ReferenceOccurrence::span).collect();

    for caps in REFERENCE_REGEX.captures_iter(text) {
        let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let covered = embed_spans
            .iter()
            .any(|span| whole.start() >= span.start && whole.end() <= span.end);
        if covered {
            continue;
        }
        occurrences.push(ReferenceOccurrence {
            from: whole.start(),
            to: whole.end(),
            uuid: normalize_block_id(id.as_str()),
            is_embed: false,
        });
    }

    occurrences.sort_by_key(|occurrence| occurrence.from);
    for occurrence in &mut occurrences {
        occurrence.from += base_offset;
        occurrence.to += base_offset;
    }
    occurrences
}

/// Scan only the visible parts of `doc`.
///
/// Each range is clamped to the document and widened to whole lines, so a
/// reference straddling a viewport edge is still found. Overlapping ranges
/// are merged; the result is ordered by `from` with no duplicates.
pub fn scan_visible(doc: &str, ranges: &[Range<usize>]) -> Vec<ReferenceOccurrence> {
    let mut lines: Vec<Range<usize>> = ranges
        .iter()
        .filter_map(|range| widen_to_lines(doc, range))
        .collect();
    lines.sort_by_key(|range| range.start);

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(lines.len());
    for range in lines {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }

    let mut occurrences: Vec<ReferenceOccurrence> = merged
        .into_iter()
        .flat_map(|range| scan_references(&doc[range.clone()], range.start))
        .collect();
    occurrences.dedup_by_key(|occurrence| occurrence.from);
    occurrences
}

fn widen_to_lines(doc: &str, range: &Range<usize>) -> Option<Range<usize>> {
    let start = range.start.min(doc.len());
    let end = range.end.min(doc.len());
    if start > end {
        return None;
    }

    // Newlines are ASCII, so positions next to them are always char boundaries.
    let line_start = doc.as_bytes()[..start]
        .iter()
        .rposition(|&byte| byte == b'\n')
        .map_or(0, |newline| newline + 1);
    let line_end = doc.as_bytes()[end..]
        .iter()
        .position(|&byte| byte == b'\n')
        .map_or(doc.len(), |newline| end + newline);

    Some(line_start..line_end)
}

/// Whether `candidate` is a canonical block id.
pub fn is_block_id(candidate: &str) -> bool {
    BLOCK_ID_REGEX.is_match(candidate)
}

/// Canonical (lowercase) form of a block id, used for every index key.
pub fn normalize_block_id(id: &str) -> String {
    id.to_ascii_lowercase()
}

/// Inline reference text for `id`.
pub fn block_reference(id: &str) -> String {
    format!("(({id}))")
}

/// Inline embed text for `id`.
pub fn block_embed(id: &str) -> String {
    format!("{{{{embed (({id}))}}}}")
}
