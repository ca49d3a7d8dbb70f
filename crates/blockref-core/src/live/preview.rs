//! The live preview driver
//!
//! Ties a [`LiveDocument`] to a [`RenderCoordinator`]: edits and viewport
//! changes re-arm a scan debounce, each scan first applies every effect the
//! resolutions have reported so far, moves tracked occurrences through the
//! edits made since the previous scan, then reconciles the new occurrences.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::coordinator::{EffectReceiver, RenderCoordinator};
use super::document::{LiveDocument, TextEdit};
use super::render::BlockRenderer;
use crate::debounce::Debouncer;
use crate::error::Result;

/// Notifications from the editing surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Edit(TextEdit),
    Viewport(Vec<Range<usize>>),
    /// The block index changed; every visual may be stale.
    IndexChanged,
    Close,
}

pub struct LivePreview {
    document: LiveDocument,
    coordinator: RenderCoordinator,
    effects: EffectReceiver,
    scan: Debouncer,
    scans: u64,
}

impl LivePreview {
    /// Wrap `document`; the first scan is scheduled right away.
    pub fn new(document: LiveDocument, blocks: Arc<BlockRenderer>, scan_debounce: Duration) -> Self {
        let (coordinator, effects) = RenderCoordinator::new(blocks);
        let mut scan = Debouncer::new(scan_debounce);
        scan.trigger();
        Self {
            document,
            coordinator,
            effects,
            scan,
            scans: 0,
        }
    }

    pub fn document(&self) -> &LiveDocument {
        &self.document
    }

    pub fn coordinator(&self) -> &RenderCoordinator {
        &self.coordinator
    }

    pub fn into_document(self) -> LiveDocument {
        self.document
    }

    /// Number of scans performed so far.
    pub fn scan_count(&self) -> u64 {
        self.scans
    }

    pub fn is_scan_pending(&self) -> bool {
        self.scan.is_pending()
    }

    pub fn edit(&mut self, edit: TextEdit) -> Result<()> {
        self.document.edit(edit)?;
        self.scan.trigger();
        Ok(())
    }

    pub fn set_viewport(&mut self, ranges: Vec<Range<usize>>) {
        self.document.set_visible_ranges(ranges);
        self.scan.trigger();
    }

    /// Apply every effect reported so far. Returns how many were applied.
    pub fn drain_effects(&mut self) -> usize {
        let mut live = Vec::new();
        while let Ok(queued) = self.effects.try_recv() {
            live.extend(queued.into_live());
        }
        self.document.apply_effects(live)
    }

    /// Scan immediately, cancelling any pending debounced scan.
    pub fn scan_now(&mut self) {
        self.scan.cancel();
        self.drain_effects();

        match self.document.changes_since(self.coordinator.scanned_at()) {
            Some(changes) => self.coordinator.remap(&changes),
            // Older than the change log; positions cannot be trusted.
            None => self.coordinator.reset(),
        }

        let occurrences = self.document.scan();
        let started = self
            .coordinator
            .reconcile(&occurrences, self.document.overlay(), self.document.revision());
        self.scans += 1;
        trace!(
            "Scan {} found {} occurrences, started {} resolutions",
            self.scans,
            occurrences.len(),
            started
        );
    }

    /// Drop every visual and resolve all occurrences again.
    pub fn refresh(&mut self) {
        debug!("Refreshing live preview of {}", self.document.path());
        self.coordinator.reset();
        self.drain_effects();
        self.document.clear_overlay();
        self.scan_now();
    }

    /// Run until no scan is pending and no resolution is in flight, with all
    /// reported effects applied.
    pub async fn settle(&mut self) {
        loop {
            if self.scan.is_pending() {
                self.scan.fired().await;
                self.scan_now();
            }
            self.coordinator.wait_idle().await;
            self.drain_effects();
            if !self.scan.is_pending() {
                break;
            }
        }
    }

    /// Drive the preview from surface events until `Close` or the channel
    /// closes, then hand the document back.
    pub async fn run(mut self, mut events: mpsc::Receiver<SurfaceEvent>) -> LiveDocument {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(SurfaceEvent::Edit(edit)) => {
                        if let Err(e) = self.edit(edit) {
                            debug!("Ignoring edit: {}", e);
                        }
                    }
                    Some(SurfaceEvent::Viewport(ranges)) => self.set_viewport(ranges),
                    Some(SurfaceEvent::IndexChanged) => self.refresh(),
                    Some(SurfaceEvent::Close) | None => break,
                },
                Some(queued) = self.effects.recv() => {
                    if let Some(effect) = queued.into_live() {
                        self.document.apply_effects([effect]);
                    }
                }
                _ = self.scan.fired() => self.scan_now(),
            }
        }
        self.drain_effects();
        self.document
    }
}
