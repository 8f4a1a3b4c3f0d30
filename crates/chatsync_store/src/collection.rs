//! One id-keyed record collection and its reconciliation primitives.
//!
//! Conversations and messages are reconciled identically; every rule lives
//! here once and the store applies it to both collections.

use chatsync_protocol::{RawRecord, Record, Tombstone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Result of a bulk merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Records written.
    pub applied: usize,
    /// Records dropped by the tombstone guard.
    pub discarded: usize,
}

impl MergeOutcome {
    /// Returns true if anything was written.
    pub fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// Result of a single-record upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The id was new.
    Inserted,
    /// A live record was overwritten and flagged modified.
    Updated,
    /// The id is tombstoned; nothing was written.
    Discarded,
}

impl UpsertOutcome {
    /// Returns true if anything was written.
    pub fn changed(&self) -> bool {
        !matches!(self, UpsertOutcome::Discarded)
    }
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// A live record became a tombstone.
    Tombstoned,
    /// The id was already a tombstone.
    AlreadyDeleted,
    /// The id does not exist.
    NotFound,
}

/// Records fetched for delivery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fetched {
    /// Delivered records by id.
    pub records: BTreeMap<String, Record>,
    /// How many dirty flags were consumed.
    pub cleared: usize,
}

/// An id-keyed collection of records.
///
/// Invariants:
/// - the map key equals the record's own id
/// - a tombstone is never replaced by a live record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    records: BTreeMap<String, Record>,
}

impl Collection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records, tombstones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the collection holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns a record by id.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    /// Iterates over all records in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Record)> {
        self.records.iter()
    }

    /// Returns the number of tombstones.
    pub fn tombstone_count(&self) -> usize {
        self.records.values().filter(|r| r.is_tombstone()).count()
    }

    /// Returns the number of records with the dirty flag set.
    pub fn modified_count(&self) -> usize {
        self.records.values().filter(|r| r.is_modified()).count()
    }

    /// Ids the client must fetch, in id order.
    ///
    /// Tombstones and dirty records are always reported; any other record is
    /// reported when the client does not list it.
    pub fn missing_on_client(&self, client_ids: &[String]) -> Vec<String> {
        let known: HashSet<&str> = client_ids.iter().map(String::as_str).collect();
        self.records
            .iter()
            .filter(|(id, record)| {
                record.is_tombstone() || record.is_modified() || !known.contains(id.as_str())
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Client ids this collection lacks entirely, in client order.
    pub fn missing_on_server(&self, client_ids: &[String]) -> Vec<String> {
        client_ids
            .iter()
            .filter(|id| !self.records.contains_key(id.as_str()))
            .cloned()
            .collect()
    }

    /// Fetches records for delivery, consuming their dirty flags.
    ///
    /// Unknown ids are skipped.
    pub fn fetch(&mut self, ids: &[String]) -> Fetched {
        let mut fetched = Fetched::default();
        for id in ids {
            if let Some(record) = self.records.get_mut(id) {
                if record.clear_modified() {
                    fetched.cleared += 1;
                }
                fetched.records.insert(id.clone(), record.delivery_form());
            }
        }
        fetched
    }

    /// Bulk upsert. Records are stored verbatim except where a tombstone
    /// already holds the id.
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = Record>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        for record in incoming {
            if self.is_tombstoned(record.id()) {
                outcome.discarded += 1;
                continue;
            }
            self.records.insert(record.id().to_string(), record);
            outcome.applied += 1;
        }
        outcome
    }

    /// Single-record upsert. Overwriting a live record sets its dirty flag;
    /// a first insert is always stored clean.
    pub fn upsert(&mut self, mut record: Record) -> UpsertOutcome {
        let outcome = match self.records.get(record.id()) {
            Some(existing) if existing.is_tombstone() => return UpsertOutcome::Discarded,
            Some(_) => {
                record.mark_modified();
                UpsertOutcome::Updated
            }
            None => {
                record.clear_modified();
                UpsertOutcome::Inserted
            }
        };
        self.records.insert(record.id().to_string(), record);
        outcome
    }

    /// Replaces a live record with a tombstone stamped `deleted_at` (Unix
    /// seconds). Existing tombstones keep their original timestamp.
    pub fn delete(&mut self, id: &str, deleted_at: i64) -> DeleteOutcome {
        match self.records.get_mut(id) {
            None => DeleteOutcome::NotFound,
            Some(record) if record.is_tombstone() => DeleteOutcome::AlreadyDeleted,
            Some(record) => {
                *record = Tombstone::at_unix_secs(id, deleted_at).into();
                DeleteOutcome::Tombstoned
            }
        }
    }

    /// Physically removes tombstones matching `predicate`. Returns the removed
    /// ids.
    ///
    /// This is the manual purge; no sync operation calls it.
    pub fn purge_tombstones(&mut self, mut predicate: impl FnMut(&Tombstone) -> bool) -> Vec<String> {
        let doomed: Vec<String> = self
            .records
            .iter()
            .filter_map(|(id, record)| match record.as_tombstone() {
                Some(t) if predicate(t) => Some(id.clone()),
                _ => None,
            })
            .collect();
        for id in &doomed {
            self.records.remove(id);
        }
        doomed
    }

    fn is_tombstoned(&self, id: &str) -> bool {
        self.records.get(id).is_some_and(Record::is_tombstone)
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Collection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Keys are authoritative; stored objects may lack their own `id`.
        // Unusable entries are dropped one by one so they cannot sink the
        // rest of the file.
        let raw = Option::<BTreeMap<String, Option<RawRecord>>>::deserialize(deserializer)?;
        let mut records = BTreeMap::new();
        for (key, obj) in raw.unwrap_or_default() {
            let Some(obj) = obj else {
                warn!(id = %key, "skipping null record");
                continue;
            };
            match Record::from_keyed_object(&key, obj) {
                Ok(record) => {
                    records.insert(key, record);
                }
                Err(e) => warn!(id = %key, error = %e, "skipping unusable record"),
            }
        }
        Ok(Self { records })
    }
}
