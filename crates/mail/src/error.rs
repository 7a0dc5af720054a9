//! Error taxonomy for the mail crate
//!
//! Storage and remote failures have their own types so callers can tell a
//! local write failure apart from a flaky Gmail call. [`Error`] ties them
//! together with usage errors for the selection path.

use std::path::PathBuf;

use crate::models::MessageId;

/// Local store failure. Never retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to open store at {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to run store migrations: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// A single remote call (list, fetch, batch delete) failed
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote transport error: {0}")]
    Transport(String),

    #[error("message {} not found on remote", .0.as_str())]
    NotFound(MessageId),
}

impl RemoteError {
    /// Wrap an adapter error, keeping its whole context chain
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(format!("{err:#}"))
    }
}

/// Top-level error for core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or insufficient input; nothing was mutated
    #[error("{0}")]
    Usage(String),

    #[error("failed to read address file {}: {source}", path.display())]
    AddressFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl Error {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Result alias for store operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;
