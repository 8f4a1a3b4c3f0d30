//! # chatsync store
//!
//! Token-partitioned record store and file persistence for chatsync.
//!
//! This crate provides:
//! - [`Token`], the opaque per-user namespace
//! - [`Collection`] with the reconciliation primitives (diff in both
//!   directions, fetch-clears-dirty, tombstone-guarded merge and upsert,
//!   idempotent delete)
//! - [`UserData`], the two collections owned by one token
//! - [`Store`], the whole token map behind one read/write lock
//! - [`PersistenceManager`], atomic save/load of the store to one JSON file
//!
//! # Invariants
//!
//! - A tombstone is never overwritten by a live record
//! - `modified` is set only by single-record updates and cleared by fetches
//! - A collection's map key always equals the record's own id
//! - User data is created lazily and never removed

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod collection;
mod error;
mod persist;
mod store;
mod token;
mod user_data;

pub use collection::{Collection, DeleteOutcome, Fetched, MergeOutcome, UpsertOutcome};
pub use error::{StoreError, StoreResult};
pub use persist::{LoadStatus, PersistenceManager, DEFAULT_STORAGE_FILE};
pub use store::{Store, StoreMap};
pub use token::Token;
pub use user_data::{UserData, UserStats};

/// Current time as Unix seconds, the unit of server-stamped `deletedAt`.
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
