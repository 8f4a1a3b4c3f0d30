//! Per-token data.

use crate::collection::Collection;
use chatsync_protocol::{null_as_default, CollectionKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything stored for one token: the two synchronized collections plus an
/// opaque key map that sync never touches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    /// Conversations by id.
    #[serde(default)]
    pub conversations: Collection,
    /// Messages by id.
    #[serde(default)]
    pub messages: Collection,
    /// Opaque per-user key material, persisted verbatim.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub api_keys: BTreeMap<String, String>,
}

impl UserData {
    /// Creates empty user data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns one collection.
    pub fn collection(&self, kind: CollectionKind) -> &Collection {
        match kind {
            CollectionKind::Conversation => &self.conversations,
            CollectionKind::Message => &self.messages,
        }
    }

    /// Returns one collection, mutably.
    pub fn collection_mut(&mut self, kind: CollectionKind) -> &mut Collection {
        match kind {
            CollectionKind::Conversation => &mut self.conversations,
            CollectionKind::Message => &mut self.messages,
        }
    }

    /// Returns summary counts.
    pub fn stats(&self) -> UserStats {
        UserStats {
            conversations: self.conversations.len(),
            messages: self.messages.len(),
            tombstones: self.conversations.tombstone_count() + self.messages.tombstone_count(),
            modified: self.conversations.modified_count() + self.messages.modified_count(),
        }
    }
}

/// Summary counts for one token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    /// Conversations, tombstones included.
    pub conversations: usize,
    /// Messages, tombstones included.
    pub messages: usize,
    /// Tombstones across both collections.
    pub tombstones: usize,
    /// Dirty records across both collections.
    pub modified: usize,
}
