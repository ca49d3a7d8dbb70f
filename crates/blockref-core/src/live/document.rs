//! The live text buffer with its overlay.

use std::collections::VecDeque;
use std::ops::Range;

use blockref_parser::{scan_visible, ReferenceOccurrence};

use super::overlay::{Overlay, OverlayEffect, OverlayState, TextChange};
use super::render::loading_html;
use crate::error::{IndexError, Result};

/// Oldest changes are forgotten past this many; effects stamped before the
/// oldest remembered revision are discarded.
const MAX_CHANGE_LOG: usize = 1024;

/// Replace `[from, to)` with `insert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub from: usize,
    pub to: usize,
    pub insert: String,
}

impl TextEdit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            from: at,
            to: at,
            insert: text.into(),
        }
    }

    pub fn delete(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            insert: String::new(),
        }
    }

    pub fn replace(from: usize, to: usize, text: impl Into<String>) -> Self {
        Self {
            from,
            to,
            insert: text.into(),
        }
    }

    fn change(&self) -> TextChange {
        TextChange::new(self.from, self.to, self.insert.len())
    }
}

/// An overlay effect tagged with the document revision it was computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedEffect {
    pub revision: u64,
    pub effect: OverlayEffect,
}

#[derive(Debug, Clone)]
pub struct LiveDocument {
    path: String,
    text: String,
    /// `None` means the whole document is visible.
    visible: Option<Vec<Range<usize>>>,
    overlay: Overlay,
    revision: u64,
    /// `changes[i]` took the document from `base_revision + i` to the next revision.
    changes: VecDeque<TextChange>,
    base_revision: u64,
}

impl LiveDocument {
    /// A document for the vault file `path` (used as the link base when rendering).
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            visible: None,
            overlay: Overlay::new(),
            revision: 0,
            changes: VecDeque::new(),
            base_revision: 0,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Apply an edit to the buffer and remap the overlay through it.
    pub fn edit(&mut self, edit: TextEdit) -> Result<()> {
        let valid = edit.from <= edit.to
            && edit.to <= self.text.len()
            && self.text.is_char_boundary(edit.from)
            && self.text.is_char_boundary(edit.to);
        if !valid {
            return Err(IndexError::InvalidEdit {
                from: edit.from,
                to: edit.to,
            });
        }

        let change = edit.change();
        self.text.replace_range(edit.from..edit.to, &edit.insert);
        self.overlay.update(&[change], Vec::new());

        self.changes.push_back(change);
        self.revision += 1;
        if self.changes.len() > MAX_CHANGE_LOG {
            self.changes.pop_front();
            self.base_revision += 1;
        }
        Ok(())
    }

    pub fn set_visible_ranges(&mut self, ranges: Vec<Range<usize>>) {
        self.visible = Some(ranges);
    }

    pub fn visible_ranges(&self) -> Vec<Range<usize>> {
        match &self.visible {
            Some(ranges) => ranges.clone(),
            None => vec![0..self.text.len()],
        }
    }

    /// Reference occurrences in the visible part of the buffer.
    pub fn scan(&self) -> Vec<ReferenceOccurrence> {
        scan_visible(&self.text, &self.visible_ranges())
    }

    /// Apply effects computed at earlier revisions.
    ///
    /// Each effect is first mapped through every change made since its
    /// revision; effects whose span did not survive are dropped. Returns how
    /// many effects were applied.
    pub fn apply_effects(&mut self, effects: impl IntoIterator<Item = StampedEffect>) -> usize {
        let mapped: Vec<OverlayEffect> = effects
            .into_iter()
            .filter_map(|stamped| self.map_to_current(stamped))
            .collect();
        let applied = mapped.len();
        if applied > 0 {
            self.overlay.update(&[], mapped);
        }
        applied
    }

    /// Changes made after `revision`, oldest first, or `None` when `revision`
    /// is unknown or has fallen out of the change log.
    pub fn changes_since(&self, revision: u64) -> Option<Vec<TextChange>> {
        if revision < self.base_revision || revision > self.revision {
            return None;
        }
        let skip = (revision - self.base_revision) as usize;
        Some(self.changes.iter().skip(skip).copied().collect())
    }

    fn map_to_current(&self, stamped: StampedEffect) -> Option<OverlayEffect> {
        if stamped.revision < self.base_revision || stamped.revision > self.revision {
            return None;
        }
        let skip = (stamped.revision - self.base_revision) as usize;
        self.changes
            .iter()
            .skip(skip)
            .try_fold(stamped.effect, |effect, change| effect.map_through(change))
    }

    pub fn clear_overlay(&mut self) {
        self.overlay.clear();
    }

    /// The buffer with every overlay span replaced by its visual.
    pub fn materialize(&self) -> String {
        let mut output = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for entry in self.overlay.entries() {
            if entry.from < cursor || entry.to > self.text.len() {
                continue;
            }
            output.push_str(&self.text[cursor..entry.from]);
            match &entry.state {
                OverlayState::Loading { uuid } => output.push_str(&loading_html(uuid)),
                OverlayState::Rendered { html } => output.push_str(html),
            }
            cursor = entry.to;
        }
        output.push_str(&self.text[cursor..]);
        output
    }
}
