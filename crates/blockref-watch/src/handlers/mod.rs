//! Event handlers and their registry.

mod indexing;

use std::sync::Arc;

pub use indexing::IndexingHandler;

use crate::events::FileEvent;
use crate::traits::EventHandler;

/// Registered handlers, kept in dispatch order (highest priority first,
/// then registration order).
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        let position = self
            .handlers
            .iter()
            .position(|existing| existing.priority() < handler.priority())
            .unwrap_or(self.handlers.len());
        self.handlers.insert(position, handler);
    }

    /// Remove every handler called `name`. Returns whether any was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|handler| handler.name() != name);
        self.handlers.len() != before
    }

    pub fn handlers_for(&self, event: &FileEvent) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .iter()
            .filter(|handler| handler.can_handle(event))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
