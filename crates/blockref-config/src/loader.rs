//! Locating and reading the configuration file

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::BlockRefConfig;
use crate::error::{ConfigError, Result};

/// Loads [`BlockRefConfig`] from TOML.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration.
    ///
    /// An explicit path must exist and parse. Without one, the per-user file
    /// from [`ConfigLoader::default_config_path`] is used when present,
    /// otherwise defaults. The result is always validated.
    pub fn load(explicit: Option<&Path>) -> Result<BlockRefConfig> {
        let config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::default_config_path().filter(|path| path.exists()) {
                Some(path) => Self::load_from_file(&path)?,
                None => {
                    debug!("No config file found, using defaults");
                    BlockRefConfig::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse one TOML file without validating it.
    pub fn load_from_file(path: &Path) -> Result<BlockRefConfig> {
        debug!("Loading config from {}", path.display());

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&contents, path)
    }

    /// Parse TOML text; `origin` only labels errors.
    pub fn load_from_str(contents: &str, origin: &Path) -> Result<BlockRefConfig> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// `<config dir>/blockref/config.toml`, when the platform has a config dir.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("blockref").join("config.toml"))
    }

    /// The given configuration as pretty TOML, e.g. for `--print-config` style output.
    pub fn to_toml(config: &BlockRefConfig) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(config)
    }

    /// The given configuration as pretty JSON.
    pub fn to_json(config: &BlockRefConfig) -> serde_json::Result<String> {
        serde_json::to_string_pretty(config)
    }
}
