//! Span-keyed overlay of reference visuals over a live buffer.
//!
//! Entries never overlap. They move with the text through [`TextChange`]s and
//! change state only through [`OverlayEffect`]s. Within one
//! [`Overlay::update`] the changes are mapped first, then the effects applied.

use std::ops::Range;

/// One replacement of `[from, to)` in the old text by `inserted` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChange {
    pub from: usize,
    pub to: usize,
    pub inserted: usize,
}

impl TextChange {
    pub fn new(from: usize, to: usize, inserted: usize) -> Self {
        Self { from, to, inserted }
    }

    /// Byte delta (positive for growth, negative for shrinkage).
    fn delta(&self) -> i64 {
        self.inserted as i64 - (self.to - self.from) as i64
    }

    /// Map the span `[from, to)` through this change.
    ///
    /// A change ending at or before `from` (including a pure insertion at
    /// `from`) shifts the span; a change starting at or after `to` leaves it
    /// in place; anything touching the inside invalidates it.
    pub fn map_span(&self, from: usize, to: usize) -> Option<(usize, usize)> {
        if self.to <= from {
            let delta = self.delta();
            Some((apply_delta(from, delta), apply_delta(to, delta)))
        } else if self.from >= to {
            Some((from, to))
        } else {
            None
        }
    }
}

fn apply_delta(position: usize, delta: i64) -> usize {
    (position as i64).saturating_add(delta).max(0) as usize
}

/// What an overlay entry currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayState {
    Loading { uuid: String },
    Rendered { html: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayEntry {
    pub from: usize,
    pub to: usize,
    pub state: OverlayState,
}

impl OverlayEntry {
    pub fn span(&self) -> Range<usize> {
        self.from..self.to
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self.state, OverlayState::Rendered { .. })
    }

    fn overlaps(&self, from: usize, to: usize) -> bool {
        self.from < to && from < self.to
    }
}

/// The two explicit overlay transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayEffect {
    MarkLoading { from: usize, to: usize, uuid: String },
    MarkRendered { from: usize, to: usize, html: String },
}

impl OverlayEffect {
    pub fn span(&self) -> (usize, usize) {
        match self {
            Self::MarkLoading { from, to, .. } | Self::MarkRendered { from, to, .. } => (*from, *to),
        }
    }

    /// The same effect mapped through `change`, or `None` if its span was edited.
    pub fn map_through(self, change: &TextChange) -> Option<Self> {
        let (from, to) = self.span();
        let (from, to) = change.map_span(from, to)?;
        Some(match self {
            Self::MarkLoading { uuid, .. } => Self::MarkLoading { from, to, uuid },
            Self::MarkRendered { html, .. } => Self::MarkRendered { from, to, html },
        })
    }

    fn into_entry(self) -> OverlayEntry {
        match self {
            Self::MarkLoading { from, to, uuid } => OverlayEntry {
                from,
                to,
                state: OverlayState::Loading { uuid },
            },
            Self::MarkRendered { from, to, html } => OverlayEntry {
                from,
                to,
                state: OverlayState::Rendered { html },
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Overlay {
    /// Sorted by `from`, non-overlapping.
    entries: Vec<OverlayEntry>,
    redraws: u64,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every entry through `changes`, then apply `effects` in order.
    ///
    /// Returns whether anything visible changed: an entry was dropped by an
    /// edit, or an effect replaced an entry with a different one.
    pub fn update(&mut self, changes: &[TextChange], effects: Vec<OverlayEffect>) -> bool {
        let mut changed = false;

        for change in changes {
            let before = self.entries.len();
            self.entries = std::mem::take(&mut self.entries)
                .into_iter()
                .filter_map(|entry| {
                    let (from, to) = change.map_span(entry.from, entry.to)?;
                    Some(OverlayEntry { from, to, ..entry })
                })
                .collect();
            changed |= self.entries.len() != before;
        }

        for effect in effects {
            changed |= self.apply(effect);
        }

        if changed {
            self.redraws += 1;
        }
        changed
    }

    fn apply(&mut self, effect: OverlayEffect) -> bool {
        let entry = effect.into_entry();

        let unchanged = self.entries.iter().any(|existing| existing == &entry);
        if unchanged {
            return false;
        }

        self.entries
            .retain(|existing| !existing.overlaps(entry.from, entry.to));
        let position = self
            .entries
            .partition_point(|existing| existing.from < entry.from);
        self.entries.insert(position, entry);
        true
    }

    pub fn entries(&self) -> &[OverlayEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry covering exactly `[from, to)`.
    pub fn entry_at(&self, from: usize, to: usize) -> Option<&OverlayEntry> {
        self.entries
            .iter()
            .find(|entry| entry.from == from && entry.to == to)
    }

    pub fn has_rendered(&self, from: usize, to: usize) -> bool {
        self.entry_at(from, to).is_some_and(OverlayEntry::is_rendered)
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.redraws += 1;
        }
    }

    /// Number of updates that required a redraw.
    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loading(from: usize, to: usize) -> OverlayEffect {
        OverlayEffect::MarkLoading {
            from,
            to,
            uuid: "u".to_string(),
        }
    }

    fn rendered(from: usize, to: usize, html: &str) -> OverlayEffect {
        OverlayEffect::MarkRendered {
            from,
            to,
            html: html.to_string(),
        }
    }

    #[test]
    fn test_map_span_rules() {
        // insertion before
        assert_eq!(TextChange::new(2, 2, 3).map_span(10, 20), Some((13, 23)));
        // pure insertion at start
        assert_eq!(TextChange::new(10, 10, 1).map_span(10, 20), Some((11, 21)));
        // deletion ending at start
        assert_eq!(TextChange::new(5, 10, 0).map_span(10, 20), Some((5, 15)));
        // insertion at end
        assert_eq!(TextChange::new(20, 20, 4).map_span(10, 20), Some((10, 20)));
        // interior edit
        assert_eq!(TextChange::new(12, 13, 0).map_span(10, 20), None);
        // change covering the whole span
        assert_eq!(TextChange::new(0, 30, 2).map_span(10, 20), None);
        // change straddling the start
        assert_eq!(TextChange::new(8, 11, 0).map_span(10, 20), None);
    }

    #[test]
    fn test_mark_loading_then_rendered_replaces() {
        let mut overlay = Overlay::new();
        overlay.update(&[], vec![loading(0, 10)]);
        overlay.update(&[], vec![rendered(0, 10, "<b>x</b>")]);

        assert_eq!(overlay.len(), 1);
        assert!(overlay.has_rendered(0, 10));
    }

    #[test]
    fn test_effects_remove_overlapping_entries() {
        let mut overlay = Overlay::new();
        overlay.update(&[], vec![rendered(0, 10, "a"), rendered(20, 30, "b")]);
        overlay.update(&[], vec![loading(5, 25)]);

        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay.entries()[0].span(), 5..25);
    }

    #[test]
    fn test_identical_effect_is_not_redrawn() {
        let mut overlay = Overlay::new();
        assert!(overlay.update(&[], vec![rendered(0, 10, "same")]));
        let redraws = overlay.redraw_count();

        assert!(!overlay.update(&[], vec![rendered(0, 10, "same")]));
        assert_eq!(overlay.redraw_count(), redraws);

        assert!(overlay.update(&[], vec![rendered(0, 10, "different")]));
    }

    #[test]
    fn test_changes_apply_before_effects() {
        let mut overlay = Overlay::new();
        overlay.update(&[], vec![rendered(10, 20, "a")]);

        // Insert 5 bytes at the front; an effect for the shifted span lands on it.
        overlay.update(&[TextChange::new(0, 0, 5)], vec![rendered(15, 25, "b")]);

        assert_eq!(overlay.len(), 1);
        assert_eq!(
            overlay.entry_at(15, 25).unwrap().state,
            OverlayState::Rendered {
                html: "b".to_string()
            }
        );
    }

    #[test]
    fn test_interior_edit_drops_entry() {
        let mut overlay = Overlay::new();
        overlay.update(&[], vec![rendered(10, 20, "a"), rendered(30, 40, "b")]);

        assert!(overlay.update(&[TextChange::new(15, 16, 0)], vec![]));
        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay.entries()[0].span(), 29..39);
    }

    #[test]
    fn test_entries_stay_sorted() {
        let mut overlay = Overlay::new();
        overlay.update(&[], vec![loading(30, 40), loading(0, 10), loading(15, 20)]);

        let starts: Vec<usize> = overlay.entries().iter().map(|e| e.from).collect();
        assert_eq!(starts, vec![0, 15, 30]);
    }
}
