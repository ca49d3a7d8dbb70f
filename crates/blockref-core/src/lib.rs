//! # Blockref Core
//!
//! The block index and everything that reads it:
//!
//! - [`index`]: the vault-wide id → block mapping, owned by a single service
//!   task that serializes rebuilds and file events, with debounced snapshots
//! - [`vault`] and [`snapshot`]: the file store and persistence collaborators
//! - [`live`]: reference scanning, async resolution and the overlay over an
//!   editable buffer
//! - [`commands`]: copy-reference and autocomplete
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use blockref_core::{IndexOptions, IndexService, MemorySnapshotStore, MemoryVault};
//!
//! # async fn example() -> blockref_core::Result<()> {
//! let vault = MemoryVault::new().with_file(
//!     "page.md",
//!     "- First block\n  id:: 11111111-1111-1111-1111-111111111111\n",
//! );
//! let index = IndexService::spawn(
//!     Arc::new(vault),
//!     Arc::new(MemorySnapshotStore::new()),
//!     IndexOptions::default(),
//! );
//! index.initialize().await?;
//! assert!(index.get_block("11111111-1111-1111-1111-111111111111").is_some());
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod debounce;
pub mod error;
pub mod index;
pub mod live;
pub mod snapshot;
pub mod vault;

pub use commands::{copy_block_reference, suggest, BlockSuggestion, CopiedReference, IdInsertion};
pub use debounce::Debouncer;
pub use error::{IndexError, Result};
pub use index::{
    BlockIndex, IndexHandle, IndexOptions, IndexService, IndexStats, InitOutcome, InitSource,
};
pub use live::{
    BlockRenderer, HtmlRenderer, LiveDocument, LivePreview, MarkdownRenderer, SurfaceEvent,
    TextEdit,
};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use vault::{FsVault, MemoryVault, Vault};

pub use blockref_parser::{BlockEntry, BlockRecord};
