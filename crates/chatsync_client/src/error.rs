//! Error types for the sync client.

use chatsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while syncing.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Malformed request or response body.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server rejected the request (4xx).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The server failed to handle the request (5xx).
    #[error("server error: {0}")]
    Server(String),

    /// A record could not be interpreted.
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] ProtocolError),

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,

    /// A sync was started while another one was running.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            ClientError::Server(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(ClientError::transport_retryable("connection reset").is_retryable());
        assert!(!ClientError::transport_fatal("bad url").is_retryable());
        assert!(ClientError::Server("Internal server error".into()).is_retryable());
        assert!(!ClientError::Rejected("Token is required".into()).is_retryable());
        assert!(!ClientError::NotConnected.is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            ClientError::Rejected("Token is required".into()).to_string(),
            "request rejected: Token is required"
        );
        assert_eq!(ClientError::from(ProtocolError::MissingId).to_string(), "invalid record: record ID is required");
    }
}
