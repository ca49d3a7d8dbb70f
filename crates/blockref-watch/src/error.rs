//! Error types for the file watching system.

use blockref_core::IndexError;
use thiserror::Error;

/// Errors that can occur during file watching operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File system watching error.
    #[error("File watching error: {0}")]
    Watch(String),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The index rejected an update.
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Channel error.
    #[error("Channel error: {0}")]
    Channel(String),

    /// Pattern matching error.
    #[error("Pattern error: {0}")]
    Pattern(String),

    /// Manager is not running.
    #[error("Watch manager is not running")]
    NotRunning,

    /// Manager is already running.
    #[error("Watch manager is already running")]
    AlreadyRunning,
}

/// Result type for file watching operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error::Watch(err.to_string())
    }
}

impl From<globset::Error> for Error {
    fn from(err: globset::Error) -> Self {
        Error::Pattern(err.to_string())
    }
}
