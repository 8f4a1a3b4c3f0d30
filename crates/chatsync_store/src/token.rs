//! User namespace tokens.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, non-empty string naming one user's namespace.
///
/// No authentication is attached to a token; two requests with equal tokens
/// address the same data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Validates a raw token.
    pub fn parse(raw: impl Into<String>) -> StoreResult<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(StoreError::EmptyToken);
        }
        Ok(Self(raw))
    }

    /// Returns the token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens double as credentials; only a prefix goes to logs.
        let prefix: String = self.0.chars().take(4).collect();
        write!(f, "{prefix}…")
    }
}
