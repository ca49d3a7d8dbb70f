//! # Blockref File Watching
//!
//! Follows the vault on disk and keeps the block index current:
//!
//! ```text
//! notify ──▶ NotifyWatcher ──▶ WatchManager ──▶ IndexingHandler ──▶ IndexHandle
//!            (debounced,        (filter,          (vault-relative
//!             rename pairing)    priority order)    paths)
//! ```

#![deny(unsafe_code)]

pub mod backends;
pub mod error;
mod events;
pub mod handlers;
mod manager;
pub mod traits;

pub use backends::NotifyWatcher;
pub use error::{Error, Result};
pub use events::{EventFilter, FileEvent, FileEventKind};
pub use handlers::{HandlerRegistry, IndexingHandler};
pub use manager::{ManagerStatus, WatchManager};
pub use traits::{EventHandler, FileWatcher, WatchHandle};
