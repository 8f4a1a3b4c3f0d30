//! Error types for the sync server.

use chatsync_protocol::CollectionKind;
use chatsync_store::StoreError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request: malformed body, missing token or id.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Storage error (opening, locking, loading).
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub(crate) fn token_required() -> Self {
        ServerError::InvalidRequest("Token is required".into())
    }

    pub(crate) fn id_required(kind: CollectionKind) -> Self {
        let label = match kind {
            CollectionKind::Conversation => "Conversation",
            CollectionKind::Message => "Message",
        };
        ServerError::InvalidRequest(format!("{label} ID is required"))
    }

    pub(crate) fn malformed_body(err: serde_json::Error) -> Self {
        ServerError::InvalidRequest(format!("failed to parse JSON: {err}"))
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServerError::InvalidRequest(_))
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns the message shown to HTTP callers.
    ///
    /// Client errors carry their own text; server errors are not detailed.
    pub fn public_message(&self) -> String {
        match self {
            ServerError::InvalidRequest(msg) => msg.clone(),
            _ => "Internal server error".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
        assert!(ServerError::Store(StoreError::EmptyToken).is_server_error());
    }

    #[test]
    fn public_messages() {
        assert_eq!(ServerError::token_required().public_message(), "Token is required");
        assert_eq!(
            ServerError::id_required(CollectionKind::Message).public_message(),
            "Message ID is required"
        );
        assert_eq!(
            ServerError::Internal("disk on fire".into()).public_message(),
            "Internal server error"
        );
    }
}
