//! Async resolution of reference occurrences.
//!
//! Every scan hands the coordinator the occurrences currently visible. It
//! cancels resolutions whose occurrence went away, and starts one for each
//! occurrence that has neither a rendered overlay entry nor a resolution in
//! flight. Resolutions run as independent tokio tasks and report back through
//! an unbounded channel of overlay effects.
//!
//! Tracked occurrences are moved through the buffer edits made between scans,
//! so a resolution in flight survives text changes elsewhere in the document.

use std::collections::HashMap;
use std::sync::Arc;

use blockref_parser::ReferenceOccurrence;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::document::StampedEffect;
use super::overlay::{Overlay, OverlayEffect, TextChange};
use super::render::{not_found_html, BlockRenderer};

/// How one resolution attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Rendered,
    NotFound,
    /// The renderer failed; the occurrence stays in its loading state.
    Failed,
    Cancelled,
}

/// An effect on its way from a resolution task to the document.
#[derive(Debug)]
pub struct QueuedEffect {
    stamped: StampedEffect,
    token: CancellationToken,
}

impl QueuedEffect {
    /// The effect, unless its resolution was cancelled after sending it.
    pub fn into_live(self) -> Option<StampedEffect> {
        (!self.token.is_cancelled()).then_some(self.stamped)
    }
}

pub type EffectReceiver = mpsc::UnboundedReceiver<QueuedEffect>;

#[derive(Debug)]
struct Tracked {
    uuid: String,
    to: usize,
    is_embed: bool,
    token: CancellationToken,
    task: Option<JoinHandle<Resolution>>,
    last: Option<Resolution>,
}

impl Tracked {
    fn matches(&self, occurrence: &ReferenceOccurrence) -> bool {
        self.uuid == occurrence.uuid && self.to == occurrence.to && self.is_embed == occurrence.is_embed
    }

    fn in_flight(&self) -> bool {
        self.task.is_some()
    }

    fn record(&mut self, outcome: Result<Resolution, tokio::task::JoinError>) {
        self.last = Some(match outcome {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!("Resolution task for (({})) failed: {}", self.uuid, e);
                Resolution::Failed
            }
        });
    }
}

pub struct RenderCoordinator {
    blocks: Arc<BlockRenderer>,
    effects: mpsc::UnboundedSender<QueuedEffect>,
    /// Keyed by occurrence start, as of `scanned_at`.
    tracked: HashMap<usize, Tracked>,
    /// Document revision of the last reconcile.
    scanned_at: u64,
    /// Cancelled resolutions that may still be running.
    retired: Vec<JoinHandle<Resolution>>,
    started: u64,
    cancelled: u64,
}

impl RenderCoordinator {
    pub fn new(blocks: Arc<BlockRenderer>) -> (Self, EffectReceiver) {
        let (effects, receiver) = mpsc::unbounded_channel();
        let coordinator = Self {
            blocks,
            effects,
            tracked: HashMap::new(),
            scanned_at: 0,
            retired: Vec::new(),
            started: 0,
            cancelled: 0,
        };
        (coordinator, receiver)
    }

    /// Revision the tracked positions refer to.
    pub fn scanned_at(&self) -> u64 {
        self.scanned_at
    }

    /// Move tracked occurrences through `changes`, made since [`Self::scanned_at`].
    ///
    /// An occurrence whose text was touched is cancelled; the rest keep their
    /// resolution under the new position.
    pub fn remap(&mut self, changes: &[TextChange]) {
        if changes.is_empty() {
            return;
        }
        let tracked = std::mem::take(&mut self.tracked);
        for (from, mut entry) in tracked {
            let mapped = changes
                .iter()
                .try_fold((from, entry.to), |(from, to), change| change.map_span(from, to));
            match mapped {
                Some((from, to)) => {
                    entry.to = to;
                    self.tracked.insert(from, entry);
                }
                None => {
                    debug!("Occurrence at {} was edited, cancelling", from);
                    self.retire(entry);
                }
            }
        }
    }

    /// Bring tracking in line with `occurrences`, scanned at `revision`.
    ///
    /// Tracked positions must already refer to `revision` (see [`Self::remap`]).
    /// Returns the number of resolutions started.
    pub fn reconcile(
        &mut self,
        occurrences: &[ReferenceOccurrence],
        overlay: &Overlay,
        revision: u64,
    ) -> usize {
        let current: HashMap<usize, &ReferenceOccurrence> = occurrences
            .iter()
            .map(|occurrence| (occurrence.from, occurrence))
            .collect();

        let gone: Vec<usize> = self
            .tracked
            .iter()
            .filter(|(from, tracked)| {
                !current
                    .get(from)
                    .is_some_and(|occurrence| tracked.matches(occurrence))
            })
            .map(|(from, _)| *from)
            .collect();
        for from in gone {
            debug!("Occurrence at {} is gone, cancelling", from);
            if let Some(tracked) = self.tracked.remove(&from) {
                self.retire(tracked);
            }
        }
        self.scanned_at = revision;
        self.prune_finished();

        let mut started = 0;
        for occurrence in occurrences {
            if overlay.has_rendered(occurrence.from, occurrence.to) {
                continue;
            }
            if let Some(tracked) = self.tracked.get(&occurrence.from) {
                if tracked.in_flight() || tracked.last == Some(Resolution::Failed) {
                    continue;
                }
            }
            self.start(occurrence.clone(), revision);
            started += 1;
        }
        started
    }

    fn start(&mut self, occurrence: ReferenceOccurrence, revision: u64) {
        let token = CancellationToken::new();
        let from = occurrence.from;
        let tracked = Tracked {
            uuid: occurrence.uuid.clone(),
            to: occurrence.to,
            is_embed: occurrence.is_embed,
            token: token.clone(),
            task: Some(tokio::spawn(resolve(
                occurrence,
                revision,
                self.blocks.clone(),
                self.effects.clone(),
                token,
            ))),
            last: None,
        };
        self.started += 1;
        self.tracked.insert(from, tracked);
    }

    fn retire(&mut self, tracked: Tracked) {
        tracked.token.cancel();
        if let Some(task) = tracked.task {
            self.retired.push(task);
        }
    }

    fn count_retired(&mut self, outcome: Result<Resolution, tokio::task::JoinError>) {
        if matches!(outcome, Ok(Resolution::Cancelled)) {
            self.cancelled += 1;
        }
    }

    /// Record outcomes of resolutions that have finished.
    fn prune_finished(&mut self) {
        let mut retired = std::mem::take(&mut self.retired);
        retired.retain_mut(|task| {
            if !task.is_finished() {
                return true;
            }
            match task.now_or_never() {
                Some(outcome) => {
                    self.count_retired(outcome);
                    false
                }
                None => true,
            }
        });
        self.retired = retired;

        for tracked in self.tracked.values_mut() {
            let finished = tracked.task.as_ref().is_some_and(JoinHandle::is_finished);
            if !finished {
                continue;
            }
            if let Some(outcome) = tracked.task.as_mut().and_then(|task| task.now_or_never()) {
                tracked.task = None;
                tracked.record(outcome);
            }
        }
    }

    /// Wait for every in-flight resolution to finish.
    pub async fn wait_idle(&mut self) {
        for tracked in self.tracked.values_mut() {
            if let Some(task) = tracked.task.take() {
                let outcome = task.await;
                tracked.record(outcome);
            }
        }
        for task in std::mem::take(&mut self.retired) {
            let outcome = task.await;
            self.count_retired(outcome);
        }
    }

    /// Cancel everything and forget all tracking, including failures.
    pub fn reset(&mut self) {
        let tracked = std::mem::take(&mut self.tracked);
        for (_, entry) in tracked {
            self.retire(entry);
        }
    }

    /// Number of resolutions still running.
    pub fn in_flight(&self) -> usize {
        self.tracked
            .values()
            .filter(|tracked| tracked.task.as_ref().is_some_and(|task| !task.is_finished()))
            .count()
    }

    /// Total resolutions started since creation.
    pub fn started(&self) -> u64 {
        self.started
    }

    /// Resolutions that were cancelled and have since stopped.
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }

    /// Outcome of the last finished resolution for the occurrence at `from`.
    pub fn last_resolution(&self, from: usize) -> Option<Resolution> {
        self.tracked.get(&from).and_then(|tracked| tracked.last)
    }
}

impl Drop for RenderCoordinator {
    fn drop(&mut self) {
        self.reset();
    }
}

async fn resolve(
    occurrence: ReferenceOccurrence,
    revision: u64,
    blocks: Arc<BlockRenderer>,
    effects: mpsc::UnboundedSender<QueuedEffect>,
    token: CancellationToken,
) -> Resolution {
    let ReferenceOccurrence {
        from,
        to,
        uuid,
        is_embed,
    } = occurrence;

    let emit = |effect: OverlayEffect| {
        if token.is_cancelled() {
            return false;
        }
        effects
            .send(QueuedEffect {
                stamped: StampedEffect { revision, effect },
                token: token.clone(),
            })
            .is_ok()
    };

    if !emit(OverlayEffect::MarkLoading {
        from,
        to,
        uuid: uuid.clone(),
    }) {
        return Resolution::Cancelled;
    }

    let block = blocks.lookup(&uuid);
    if token.is_cancelled() {
        return Resolution::Cancelled;
    }

    let (html, resolution) = match block {
        Some(block) => match blocks.render_block(&uuid, &block, is_embed).await {
            Ok(html) => (html, Resolution::Rendered),
            Err(e) => {
                warn!("Failed to render block (({})): {}", uuid, e);
                return Resolution::Failed;
            }
        },
        None => (not_found_html(&uuid), Resolution::NotFound),
    };

    if !emit(OverlayEffect::MarkRendered { from, to, html }) {
        return Resolution::Cancelled;
    }
    resolution
}
