//! Configuration structures
//!
//! Every section and field has a default, so a partial (or empty) TOML file is
//! always a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::Glob;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockRefConfig {
    pub vault: VaultConfig,
    pub index: IndexConfig,
    pub live: LiveConfig,
    pub logging: LoggingConfig,
}

/// Which files make up the vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Vault directory
    pub root: PathBuf,
    /// Indexed file extensions, without the dot (case-insensitive)
    pub extensions: Vec<String>,
    /// Vault-relative glob patterns that are never indexed.
    /// Hidden files and directories are skipped regardless.
    pub ignore: Vec<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extensions: vec!["md".to_string()],
            ignore: vec!["logseq/bak/**".to_string()],
        }
    }
}

impl VaultConfig {
    /// Whether `path` carries one of the indexed extensions.
    pub fn is_indexed_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
    }
}

/// Block index settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Snapshot location; relative paths resolve against `vault.root`
    pub cache_path: PathBuf,
    /// Trailing window that coalesces snapshot writes
    pub persist_debounce_ms: u64,
    /// A full rebuild yields to the runtime after this many files
    pub rebuild_yield_every: usize,
    /// Maximum number of search results
    pub search_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(".blockref/block-cache.json"),
            persist_debounce_ms: 1000,
            rebuild_yield_every: 100,
            search_limit: 50,
        }
    }
}

impl IndexConfig {
    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}

/// Live rendering settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Delay that collapses bursts of edits into one scan
    pub scan_debounce_ms: u64,
    /// How many levels of children an embed renders
    pub embed_max_depth: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            scan_debounce_ms: 300,
            embed_max_depth: 8,
        }
    }
}

impl LiveConfig {
    pub fn scan_debounce(&self) -> Duration {
        Duration::from_millis(self.scan_debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

impl BlockRefConfig {
    /// Snapshot path with relative paths resolved against the vault root.
    pub fn cache_path(&self) -> PathBuf {
        if self.index.cache_path.is_absolute() {
            self.index.cache_path.clone()
        } else {
            self.vault.root.join(&self.index.cache_path)
        }
    }

    /// Builder-style: point the configuration at another vault
    #[must_use]
    pub fn with_vault_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.vault.root = root.into();
        self
    }

    /// Reject values that would stall or disable the system.
    pub fn validate(&self) -> Result<()> {
        if self.vault.extensions.is_empty() {
            return Err(ConfigError::invalid("vault.extensions", "must not be empty"));
        }
        if let Some(ext) = self
            .vault
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(ConfigError::invalid(
                "vault.extensions",
                format!("'{ext}' must be a bare extension such as 'md'"),
            ));
        }
        for pattern in &self.vault.ignore {
            Glob::new(pattern).map_err(|e| {
                ConfigError::invalid("vault.ignore", format!("'{pattern}': {e}"))
            })?;
        }

        let positive = [
            ("index.persist_debounce_ms", self.index.persist_debounce_ms == 0),
            ("index.rebuild_yield_every", self.index.rebuild_yield_every == 0),
            ("index.search_limit", self.index.search_limit == 0),
            ("live.scan_debounce_ms", self.live.scan_debounce_ms == 0),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, is_zero)| *is_zero) {
            return Err(ConfigError::invalid(*field, "must be greater than zero"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!(
                    "'{}' is not one of {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }

        Ok(())
    }
}
