//! Configuration, logging and the index session shared by the commands.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use blockref_config::{BlockRefConfig, ConfigLoader};
use blockref_core::{
    FileSnapshotStore, FsVault, IndexHandle, IndexOptions, IndexService, InitOutcome,
};
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;

use crate::cli::{Cli, LogLevel};

/// Load the config file and apply command line overrides.
pub fn load_config(path: Option<&Path>, vault: Option<PathBuf>) -> Result<BlockRefConfig> {
    let mut config = ConfigLoader::load(path).context("Failed to load configuration")?;
    if let Some(root) = vault {
        config = config.with_vault_root(root);
    }
    Ok(config)
}

/// `--log-level` wins, then `--verbose`, then the config file.
pub fn resolve_log_level(cli: &Cli, config: &BlockRefConfig) -> LevelFilter {
    if let Some(level) = cli.log_level {
        return level.into();
    }
    if cli.verbose {
        return LogLevel::Debug.into();
    }
    LevelFilter::from_str(&config.logging.level).unwrap_or(LevelFilter::WARN)
}

/// Logs go to stderr so JSON output on stdout stays parseable.
pub fn init_logging(level: LevelFilter) {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// An index service over the configured vault, persisted to the cache file.
pub struct Session {
    pub config: BlockRefConfig,
    pub vault: FsVault,
    pub index: IndexHandle,
}

impl Session {
    /// Spawn the index service. Nothing is loaded until [`Session::initialize`]
    /// or an explicit rebuild.
    pub fn open(config: BlockRefConfig) -> Result<Self> {
        let vault = FsVault::new(&config.vault).context("Invalid vault configuration")?;
        let store = FileSnapshotStore::new(config.cache_path());
        debug!("Snapshot file: {}", store.path().display());

        let index = IndexService::spawn(
            Arc::new(vault.clone()),
            Arc::new(store),
            IndexOptions::from(&config.index),
        );
        Ok(Self {
            config,
            vault,
            index,
        })
    }

    pub async fn initialize(&self) -> Result<InitOutcome> {
        let outcome = self.index.initialize().await?;
        info!(
            "Index ready with {} blocks ({:?})",
            outcome.blocks, outcome.source
        );
        Ok(outcome)
    }

    /// Vault-relative path of `file`.
    ///
    /// Relative paths are tried against the vault root first, then against
    /// the working directory.
    pub fn resolve_file(&self, file: &Path) -> Result<String> {
        if file.is_relative() && self.vault.root().join(file).is_file() {
            if let Some(relative) = self.vault.relative(file) {
                return Ok(relative);
            }
        }

        let absolute = file
            .canonicalize()
            .with_context(|| format!("Cannot open {}", file.display()))?;
        let root = self
            .vault
            .root()
            .canonicalize()
            .with_context(|| format!("Cannot open vault {}", self.vault.root().display()))?;

        absolute
            .strip_prefix(&root)
            .ok()
            .and_then(|relative| self.vault.relative(relative))
            .with_context(|| {
                format!(
                    "{} is not inside the vault {}",
                    file.display(),
                    root.display()
                )
            })
    }

    /// Read a vault-relative file.
    pub async fn read(&self, relative: &str) -> Result<String> {
        let path = self.vault.absolute(relative);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    /// Stop the service, writing any pending snapshot.
    pub async fn close(self) -> Result<()> {
        self.index
            .shutdown()
            .await
            .context("Failed to persist the index")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_log_level_precedence() {
        let mut config = BlockRefConfig::default();
        config.logging.level = "info".to_string();

        let cli = Cli::try_parse_from(["blockref", "stats"]).unwrap();
        assert_eq!(resolve_log_level(&cli, &config), LevelFilter::INFO);

        let cli = Cli::try_parse_from(["blockref", "stats", "-v"]).unwrap();
        assert_eq!(resolve_log_level(&cli, &config), LevelFilter::DEBUG);

        let cli = Cli::try_parse_from(["blockref", "stats", "-v", "-l", "error"]).unwrap();
        assert_eq!(resolve_log_level(&cli, &config), LevelFilter::ERROR);
    }
}
