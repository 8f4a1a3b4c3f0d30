//! The client's local copy of a user's data.

use chatsync_protocol::{CollectionKind, Record};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Local storage the sync driver reconciles against the server.
///
/// A replica holds live records only. Applying a server tombstone removes
/// the record locally.
pub trait LocalReplica: Send + Sync {
    /// Ids of every record held for `kind`.
    fn ids(&self, kind: CollectionKind) -> Vec<String>;

    /// Returns a record by id.
    fn get(&self, kind: CollectionKind, id: &str) -> Option<Record>;

    /// Stores a record received from the server (or written locally).
    fn save(&self, kind: CollectionKind, record: Record);

    /// Removes a record deleted on the server (or locally).
    fn remove(&self, kind: CollectionKind, id: &str);
}

/// An in-memory replica.
#[derive(Debug, Default)]
pub struct MemoryReplica {
    conversations: RwLock<BTreeMap<String, Record>>,
    messages: RwLock<BTreeMap<String, Record>>,
}

impl MemoryReplica {
    /// Creates an empty replica.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held for `kind`.
    pub fn len(&self, kind: CollectionKind) -> usize {
        self.collection(kind).read().len()
    }

    /// Returns true if neither collection holds anything.
    pub fn is_empty(&self) -> bool {
        CollectionKind::ALL.iter().all(|&kind| self.len(kind) == 0)
    }

    fn collection(&self, kind: CollectionKind) -> &RwLock<BTreeMap<String, Record>> {
        match kind {
            CollectionKind::Conversation => &self.conversations,
            CollectionKind::Message => &self.messages,
        }
    }
}

impl LocalReplica for MemoryReplica {
    fn ids(&self, kind: CollectionKind) -> Vec<String> {
        self.collection(kind).read().keys().cloned().collect()
    }

    fn get(&self, kind: CollectionKind, id: &str) -> Option<Record> {
        self.collection(kind).read().get(id).cloned()
    }

    fn save(&self, kind: CollectionKind, mut record: Record) {
        // The dirty flag is server state; a replica never stores it.
        record.clear_modified();
        self.collection(kind)
            .write()
            .insert(record.id().to_string(), record);
    }

    fn remove(&self, kind: CollectionKind, id: &str) {
        self.collection(kind).write().remove(id);
    }
}
