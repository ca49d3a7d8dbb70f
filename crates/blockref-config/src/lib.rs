//! # Blockref Configuration
//!
//! Typed settings for the block index, live rendering and logging, loaded from
//! TOML with a default for every field.
//!
//! ```rust,no_run
//! use blockref_config::ConfigLoader;
//!
//! let config = ConfigLoader::load(None)?;
//! println!("vault: {}", config.vault.root.display());
//! # Ok::<(), blockref_config::ConfigError>(())
//! ```

mod config;
mod error;
mod loader;

pub use config::*;
pub use error::{ConfigError, Result};
pub use loader::ConfigLoader;
