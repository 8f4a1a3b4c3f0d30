//! Error types for the sync protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while interpreting protocol data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A record has no usable `id` (absent, empty, or not a string).
    #[error("record ID is required")]
    MissingId,

    /// Unknown endpoint path.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(ProtocolError::MissingId.to_string(), "record ID is required");
        assert!(ProtocolError::UnknownEndpoint("/nope".into())
            .to_string()
            .contains("/nope"));
    }
}
