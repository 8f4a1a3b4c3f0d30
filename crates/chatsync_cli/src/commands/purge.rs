//! Purge-tombstones command implementation.
//!
//! Tombstones are otherwise kept forever so that every client learns of
//! every deletion. Purging one means a client that has been offline since
//! before the cutoff may push the deleted record back.

use chatsync_store::{unix_now, PersistenceManager, Store, StoreError};
use std::path::Path;

const SECS_PER_DAY: i64 = 86_400;

/// Purge statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeStats {
    /// Tombstones older than the cutoff.
    pub removed: usize,
    /// Unix seconds; tombstones deleted before this are removed.
    pub cutoff: i64,
}

/// Removes tombstones whose numeric `deletedAt` is older than
/// `older_than_days`. Millisecond stamps sent by clients are compared as
/// seconds. Tombstones without a numeric timestamp are kept.
///
/// Refuses to run while another process (a running server) holds the
/// storage lock.
pub fn purge(
    path: &Path,
    older_than_days: u64,
    dry_run: bool,
) -> Result<PurgeStats, Box<dyn std::error::Error>> {
    let persistence = match PersistenceManager::open_locked(path) {
        Ok(p) => p,
        Err(StoreError::Locked { .. }) => {
            return Err("Storage is in use by a running server; stop it first".into())
        }
        Err(e) => return Err(e.into()),
    };
    let map = persistence
        .load()?
        .ok_or_else(|| format!("No storage file found at {}", path.display()))?;

    let days = i64::try_from(older_than_days).unwrap_or(i64::MAX);
    let cutoff = unix_now().saturating_sub(days.saturating_mul(SECS_PER_DAY));

    let store = Store::from_map(map);
    let removed = store.purge_tombstones(|t| t.deleted_at_secs().is_some_and(|secs| secs < cutoff));
    if !dry_run && removed > 0 {
        persistence.save(&store)?;
    }

    Ok(PurgeStats { removed, cutoff })
}

/// Runs the purge-tombstones command.
pub fn run(path: &Path, older_than_days: u64, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("Purging tombstones at {}", path.display());
    if dry_run {
        println!("(dry run - no changes will be made)");
    }

    let stats = purge(path, older_than_days, dry_run)?;
    println!(
        "  Tombstones older than {} days: {} ({})",
        older_than_days,
        stats.removed,
        if dry_run { "would be removed" } else { "removed" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_protocol::{Record, Tombstone};
    use chatsync_store::Token;
    use chatsync_testkit::prelude::*;

    fn seed(storage: &TempStorage) {
        let now = unix_now();
        let store = Store::new();
        store.upsert(&Token::parse("u1").unwrap(), |d| {
            d.conversations.merge(vec![conversation("live", "hi")]);
            d.conversations.merge(vec![
                Record::from(Tombstone::at_unix_secs("old", now - 40 * SECS_PER_DAY)),
                Record::from(Tombstone::at_unix_secs("recent", now - SECS_PER_DAY)),
                Record::from(Tombstone::new("undated", serde_json::Value::Null)),
                Record::from(Tombstone::new(
                    "old-millis",
                    serde_json::json!((now - 40 * SECS_PER_DAY) * 1000),
                )),
            ]);
        });
        PersistenceManager::new(storage.path()).save(&store).unwrap();
    }

    fn conversation_ids(storage: &TempStorage) -> Vec<String> {
        let map = PersistenceManager::new(storage.path()).load().unwrap().unwrap();
        let data = &map[&Token::parse("u1").unwrap()];
        data.conversations.iter().map(|(id, _)| id.clone()).collect()
    }

    #[test]
    fn removes_only_old_dated_tombstones() {
        let storage = TempStorage::new();
        seed(&storage);

        let stats = purge(storage.path(), 30, false).unwrap();
        assert_eq!(stats.removed, 2);
        assert_eq!(conversation_ids(&storage), ids(&["live", "recent", "undated"]));
    }

    #[test]
    fn dry_run_leaves_file_alone() {
        let storage = TempStorage::new();
        seed(&storage);

        let stats = purge(storage.path(), 30, true).unwrap();
        assert_eq!(stats.removed, 2);
        assert_eq!(conversation_ids(&storage).len(), 5);
    }

    #[test]
    fn refuses_while_locked() {
        let storage = TempStorage::new();
        seed(&storage);

        let _server_lock = PersistenceManager::open_locked(storage.path()).unwrap();
        let err = purge(storage.path(), 30, false).unwrap_err();
        assert!(err.to_string().contains("running server"));
    }
}
