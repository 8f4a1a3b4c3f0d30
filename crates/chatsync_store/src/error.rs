//! Error types for the store and persistence layer.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the store or while persisting it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The storage file could not be encoded or decoded.
    #[error("storage format error: {0}")]
    Format(#[from] serde_json::Error),

    /// Another process holds the storage lock.
    #[error("storage locked: another process has exclusive access to {}", path.display())]
    Locked {
        /// The lock file.
        path: PathBuf,
    },

    /// A token was empty.
    #[error("token is required")]
    EmptyToken,
}

impl StoreError {
    /// Returns true if the error stems from the file contents rather than the
    /// file system.
    pub fn is_format_error(&self) -> bool {
        matches!(self, StoreError::Format(_))
    }
}
