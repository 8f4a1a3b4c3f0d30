//! Test fixtures.
//!
//! Record builders for the two collections and temporary storage locations
//! that clean up after themselves.

use chatsync_protocol::{LiveRecord, RawRecord, Record};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name of the storage file inside a [`TempStorage`] directory.
pub const STORAGE_FILE: &str = "storage.json";

/// A storage file path inside a temporary directory.
pub struct TempStorage {
    path: PathBuf,
    /// Kept alive to prevent cleanup.
    _dir: TempDir,
}

impl TempStorage {
    /// Creates a fresh temporary directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        Self {
            path: dir.path().join(STORAGE_FILE),
            _dir: dir,
        }
    }

    /// Returns the storage file path (the file itself does not exist yet).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the containing directory.
    pub fn dir(&self) -> &Path {
        self._dir.path()
    }
}

impl Default for TempStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a conversation record.
pub fn conversation(id: &str, title: &str) -> Record {
    LiveRecord::new(id)
        .with_field("title", title)
        .with_field("model", "test-model")
        .into()
}

/// Builds a message record belonging to a conversation.
pub fn message(id: &str, conversation_id: &str, content: &str) -> Record {
    LiveRecord::new(id)
        .with_field("conversationId", conversation_id)
        .with_field("role", "user")
        .with_field("content", content)
        .into()
}

/// Converts a record to its wire object.
pub fn raw(record: &Record) -> RawRecord {
    record.to_object()
}

/// Builds a wire object from JSON, panicking on non-objects.
pub fn raw_json(value: serde_json::Value) -> RawRecord {
    match value {
        serde_json::Value::Object(obj) => obj,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Converts string literals to an owned id list.
pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
