//! Sync records.
//!
//! A record is either a live record carrying payload fields or a tombstone
//! announcing a deletion. The split is explicit so that a tombstone can never
//! carry payload and the dirty flag can never be attached to a tombstone.

use crate::error::{ProtocolError, ProtocolResult};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Key holding the record identity.
pub const ID_FIELD: &str = "id";
/// Key marking a tombstone.
pub const DELETED_FIELD: &str = "deleted";
/// Key holding the deletion timestamp of a tombstone.
pub const DELETED_AT_FIELD: &str = "deletedAt";
/// Key holding the dirty flag.
pub const MODIFIED_FIELD: &str = "modified";

/// Timestamps at or above this are milliseconds (as seconds it is the year 5138).
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// An untyped record object as it arrives on the wire.
pub type RawRecord = Map<String, Value>;

/// Returns true if `key` is reserved for sync metadata.
pub fn is_reserved_field(key: &str) -> bool {
    matches!(
        key,
        ID_FIELD | DELETED_FIELD | DELETED_AT_FIELD | MODIFIED_FIELD
    )
}

/// The two synchronized collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKind {
    /// Chat conversations.
    Conversation,
    /// Messages within conversations.
    Message,
}

impl CollectionKind {
    /// Both collections, in the order they are reconciled.
    pub const ALL: [CollectionKind; 2] = [CollectionKind::Conversation, CollectionKind::Message];

    /// Returns a short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Conversation => "conversation",
            CollectionKind::Message => "message",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that has not been deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveRecord {
    id: String,
    modified: bool,
    fields: Map<String, Value>,
}

impl LiveRecord {
    /// Creates an empty, clean record.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            modified: false,
            fields: Map::new(),
        }
    }

    /// Adds a payload field. Reserved keys are ignored.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !is_reserved_field(&key) {
            self.fields.insert(key, value.into());
        }
        self
    }

    /// Returns the record ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true if the dirty flag is set.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Sets or clears the dirty flag.
    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Returns the payload fields (reserved keys excluded).
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns a single payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// A deletion marker that stands in for a removed record.
#[derive(Debug, Clone, PartialEq)]
pub struct Tombstone {
    id: String,
    deleted_at: Value,
}

impl Tombstone {
    /// Creates a tombstone with an arbitrary `deletedAt` value.
    pub fn new(id: impl Into<String>, deleted_at: Value) -> Self {
        Self {
            id: id.into(),
            deleted_at,
        }
    }

    /// Creates a tombstone stamped with Unix seconds.
    pub fn at_unix_secs(id: impl Into<String>, secs: i64) -> Self {
        Self::new(id, Value::from(secs))
    }

    /// Returns the record ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the raw `deletedAt` value (`null` if the sender omitted it).
    pub fn deleted_at(&self) -> &Value {
        &self.deleted_at
    }

    /// Returns `deletedAt` as Unix seconds when it is an integer.
    ///
    /// Clients may stamp milliseconds; values too large to be seconds are
    /// scaled down.
    pub fn deleted_at_secs(&self) -> Option<i64> {
        let raw = self.deleted_at.as_i64()?;
        Some(if raw >= MILLIS_THRESHOLD { raw / 1000 } else { raw })
    }
}

/// A record in one of the synchronized collections.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A record with payload.
    Live(LiveRecord),
    /// A deleted record.
    Tombstone(Tombstone),
}

impl Record {
    /// Interprets a wire object. The object must carry a non-empty string `id`.
    pub fn from_object(mut obj: RawRecord) -> ProtocolResult<Self> {
        let id = match obj.remove(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => return Err(ProtocolError::MissingId),
        };
        Ok(Self::build(id, obj))
    }

    /// Interprets a wire object stored under `key`.
    ///
    /// The key is the record identity: a missing or different `id` field is
    /// replaced by the key.
    pub fn from_keyed_object(key: &str, mut obj: RawRecord) -> ProtocolResult<Self> {
        if key.is_empty() {
            return Err(ProtocolError::MissingId);
        }
        obj.remove(ID_FIELD);
        Ok(Self::build(key.to_string(), obj))
    }

    fn build(id: String, mut obj: RawRecord) -> Self {
        if obj.get(DELETED_FIELD) == Some(&Value::Bool(true)) {
            let deleted_at = obj.remove(DELETED_AT_FIELD).unwrap_or(Value::Null);
            return Record::Tombstone(Tombstone { id, deleted_at });
        }

        let modified = obj.remove(MODIFIED_FIELD) == Some(Value::Bool(true));
        Record::Live(LiveRecord {
            id,
            modified,
            fields: obj,
        })
    }

    /// Returns the record ID.
    pub fn id(&self) -> &str {
        match self {
            Record::Live(r) => r.id(),
            Record::Tombstone(t) => t.id(),
        }
    }

    /// Returns true if this record is a tombstone.
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Record::Tombstone(_))
    }

    /// Returns true if this is a live record with the dirty flag set.
    pub fn is_modified(&self) -> bool {
        matches!(self, Record::Live(r) if r.is_modified())
    }

    /// Sets the dirty flag on a live record. Tombstones are unaffected.
    pub fn mark_modified(&mut self) {
        if let Record::Live(r) = self {
            r.set_modified(true);
        }
    }

    /// Clears the dirty flag. Returns true if it was set.
    pub fn clear_modified(&mut self) -> bool {
        match self {
            Record::Live(r) if r.is_modified() => {
                r.set_modified(false);
                true
            }
            _ => false,
        }
    }

    /// Returns the form delivered to clients: live records without the dirty
    /// flag, tombstones reduced to `id`, `deleted` and `deletedAt`.
    pub fn delivery_form(&self) -> Record {
        let mut delivered = self.clone();
        delivered.clear_modified();
        delivered
    }

    /// Returns the live record, if any.
    pub fn as_live(&self) -> Option<&LiveRecord> {
        match self {
            Record::Live(r) => Some(r),
            Record::Tombstone(_) => None,
        }
    }

    /// Returns the tombstone, if any.
    pub fn as_tombstone(&self) -> Option<&Tombstone> {
        match self {
            Record::Tombstone(t) => Some(t),
            Record::Live(_) => None,
        }
    }

    /// Converts back into a flat wire object.
    pub fn to_object(&self) -> RawRecord {
        let mut obj = Map::new();
        match self {
            Record::Live(r) => {
                obj.insert(ID_FIELD.into(), Value::String(r.id.clone()));
                for (k, v) in &r.fields {
                    obj.insert(k.clone(), v.clone());
                }
                if r.modified {
                    obj.insert(MODIFIED_FIELD.into(), Value::Bool(true));
                }
            }
            Record::Tombstone(t) => {
                obj.insert(ID_FIELD.into(), Value::String(t.id.clone()));
                obj.insert(DELETED_FIELD.into(), Value::Bool(true));
                obj.insert(DELETED_AT_FIELD.into(), t.deleted_at.clone());
            }
        }
        obj
    }
}

impl From<LiveRecord> for Record {
    fn from(record: LiveRecord) -> Self {
        Record::Live(record)
    }
}

impl From<Tombstone> for Record {
    fn from(tombstone: Tombstone) -> Self {
        Record::Tombstone(tombstone)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Record::Live(r) => {
                let len = 1 + r.fields.len() + usize::from(r.modified);
                let mut map = serializer.serialize_map(Some(len))?;
                map.serialize_entry(ID_FIELD, &r.id)?;
                for (k, v) in &r.fields {
                    map.serialize_entry(k, v)?;
                }
                if r.modified {
                    map.serialize_entry(MODIFIED_FIELD, &true)?;
                }
                map.end()
            }
            Record::Tombstone(t) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry(ID_FIELD, &t.id)?;
                map.serialize_entry(DELETED_FIELD, &true)?;
                map.serialize_entry(DELETED_AT_FIELD, &t.deleted_at)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let obj = RawRecord::deserialize(deserializer)?;
        Record::from_object(obj).map_err(serde::de::Error::custom)
    }
}
