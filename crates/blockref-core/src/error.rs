//! Error types for the block index and live rendering.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    /// IO error while reading vault content.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The vault could not be enumerated or a file could not be read.
    #[error("Vault error for '{path}': {message}")]
    Vault { path: String, message: String },

    /// The snapshot slot could not be read or written.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// The index service task is no longer running.
    #[error("Index service has stopped")]
    ServiceStopped,

    /// The markdown renderer failed.
    #[error("Render error: {0}")]
    Render(String),

    /// A command was invoked on a line that is not an outline bullet.
    #[error("Line {line} is not a valid block line")]
    InvalidBlockLine { line: usize },

    /// A buffer edit addressed bytes outside the text or inside a character.
    #[error("Invalid edit range {from}..{to}")]
    InvalidEdit { from: usize, to: usize },
}

impl IndexError {
    pub fn vault(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Vault {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for IndexError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::ServiceStopped
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for IndexError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::ServiceStopped
    }
}
