//! Live rendering of block references inside an editable buffer.

pub mod coordinator;
pub mod document;
pub mod overlay;
pub mod preview;
pub mod render;

pub use coordinator::{EffectReceiver, QueuedEffect, RenderCoordinator, Resolution};
pub use document::{LiveDocument, StampedEffect, TextEdit};
pub use overlay::{Overlay, OverlayEffect, OverlayEntry, OverlayState, TextChange};
pub use preview::{LivePreview, SurfaceEvent};
pub use render::{
    loading_html, not_found_html, resolve_vault_path, BlockRenderer, BlockSource, HtmlRenderer,
    MarkdownRenderer,
};
