//! The in-memory, token-partitioned store.

use crate::error::StoreResult;
use crate::token::Token;
use crate::user_data::{UserData, UserStats};
use chatsync_protocol::{CollectionKind, Tombstone};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Token map as held in memory and on disk.
pub type StoreMap = BTreeMap<Token, UserData>;

/// Holds `Token -> UserData` behind one process-wide read/write lock.
///
/// Read-only access takes the shared lock; every mutation takes the
/// exclusive lock for its whole critical section. No method performs I/O.
///
/// # Example
///
/// ```
/// use chatsync_store::{Store, Token};
///
/// let store = Store::new();
/// let token = Token::parse("u1").unwrap();
/// assert!(store.get(&token).is_none());
///
/// store.upsert(&token, |data| data.api_keys.insert("k".into(), "v".into()));
/// assert!(store.get(&token).is_some());
/// ```
#[derive(Debug, Default)]
pub struct Store {
    users: RwLock<StoreMap>,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `map`.
    pub fn from_map(map: StoreMap) -> Self {
        Self {
            users: RwLock::new(map),
        }
    }

    /// Returns a copy of a token's data.
    pub fn get(&self, token: &Token) -> Option<UserData> {
        self.users.read().get(token).cloned()
    }

    /// Runs `f` against a token's data under the shared lock.
    ///
    /// Returns `None` without calling `f` if the token has no data.
    pub fn read<R>(&self, token: &Token, f: impl FnOnce(&UserData) -> R) -> Option<R> {
        self.users.read().get(token).map(f)
    }

    /// Runs `f` against a token's data under the exclusive lock, creating
    /// empty data for an unseen token first.
    pub fn upsert<R>(&self, token: &Token, f: impl FnOnce(&mut UserData) -> R) -> R {
        let mut users = self.users.write();
        let data = users.entry(token.clone()).or_default();
        f(data)
    }

    /// Runs `f` against existing data under the exclusive lock.
    ///
    /// Unlike [`Store::upsert`] this never creates data for an unseen token.
    pub fn update<R>(&self, token: &Token, f: impl FnOnce(&mut UserData) -> R) -> Option<R> {
        self.users.write().get_mut(token).map(f)
    }

    /// Returns a deep copy of the whole store.
    pub fn snapshot(&self) -> StoreMap {
        self.users.read().clone()
    }

    /// Replaces the whole store.
    pub fn replace(&self, map: StoreMap) {
        *self.users.write() = map;
    }

    /// Serializes the whole store to JSON under the shared lock.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let users = self.users.read();
        Ok(serde_json::to_vec(&*users)?)
    }

    /// Decodes a JSON token map.
    pub fn decode(bytes: &[u8]) -> StoreResult<StoreMap> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Returns the number of tokens with data.
    pub fn token_count(&self) -> usize {
        self.users.read().len()
    }

    /// Returns summary counts per token.
    pub fn stats(&self) -> BTreeMap<Token, UserStats> {
        self.users
            .read()
            .iter()
            .map(|(token, data)| (token.clone(), data.stats()))
            .collect()
    }

    /// Physically removes matching tombstones from every token and collection.
    /// Returns the number removed.
    pub fn purge_tombstones(&self, mut predicate: impl FnMut(&Tombstone) -> bool) -> usize {
        let mut users = self.users.write();
        let mut removed = 0;
        for data in users.values_mut() {
            for kind in CollectionKind::ALL {
                removed += data.collection_mut(kind).purge_tombstones(&mut predicate).len();
            }
        }
        removed
    }
}
