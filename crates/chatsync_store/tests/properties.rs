//! Property tests for the reconciliation invariants.

use chatsync_protocol::CollectionKind;
use chatsync_store::{Collection, PersistenceManager, Store, Token, UpsertOutcome};
use chatsync_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

proptest! {
    /// Once deleted, no bulk or single write brings an id back, and the
    /// tombstone keeps its timestamp.
    #[test]
    fn tombstones_are_permanent(
        seed in record_batch_strategy(),
        later in record_batch_strategy(),
        victim in record_id_strategy(),
    ) {
        let mut c = Collection::new();
        c.merge(seed);
        c.merge(vec![conversation(&victim, "doomed")]);
        c.delete(&victim, 1234);

        c.merge(later.clone());
        for record in later {
            c.upsert(record);
        }
        prop_assert_eq!(c.upsert(conversation(&victim, "again")), UpsertOutcome::Discarded);

        let tombstone = c.get(&victim).and_then(|r| r.as_tombstone());
        prop_assert!(tombstone.is_some());
        prop_assert_eq!(tombstone.and_then(|t| t.deleted_at_secs()), Some(1234));
    }

    /// A single-record update is reported missing regardless of the client's
    /// list until the record is fetched.
    #[test]
    fn dirty_flag_is_consumed_by_fetch(
        seed in record_batch_strategy(),
        client in id_list_strategy(),
    ) {
        let mut c = Collection::new();
        c.merge(seed);
        c.merge(vec![conversation("zz", "v1")]);
        c.upsert(conversation("zz", "v2"));

        let mut listed = client.clone();
        listed.push("zz".into());
        prop_assert!(c.missing_on_client(&listed).contains(&"zz".to_string()));

        c.fetch(&ids(&["zz"]));
        prop_assert!(!c.missing_on_client(&listed).contains(&"zz".to_string()));
    }

    /// Deleting twice equals deleting once.
    #[test]
    fn delete_is_idempotent(seed in record_batch_strategy(), id in record_id_strategy()) {
        let mut once = Collection::new();
        once.merge(seed);
        once.delete(&id, 10);

        let mut twice = once.clone();
        twice.delete(&id, 20);
        prop_assert_eq!(once, twice);
    }

    /// Every client id is either known to the server or reported by
    /// missing_on_server, and every server id is either listed by the client
    /// or reported by missing_on_client.
    #[test]
    fn diff_directions_are_dual(
        seed in record_batch_strategy(),
        client in id_list_strategy(),
    ) {
        let mut c = Collection::new();
        c.merge(seed);

        let server_missing: BTreeSet<_> = c.missing_on_server(&client).into_iter().collect();
        for id in &client {
            prop_assert!(c.get(id).is_some() != server_missing.contains(id));
        }

        let client_missing: BTreeSet<_> = c.missing_on_client(&client).into_iter().collect();
        for (id, _) in c.iter() {
            prop_assert!(client.contains(id) || client_missing.contains(id));
        }
    }
}

#[test]
fn duality_scenario() {
    let mut c = Collection::new();
    c.merge(vec![conversation("A", "a"), conversation("B", "b")]);

    assert_eq!(c.missing_on_server(&ids(&["B", "C"])), ids(&["C"]));
    assert_eq!(c.missing_on_client(&ids(&["B", "C"])), ids(&["A"]));
}

#[test]
fn persistence_round_trip_keeps_metadata() {
    let storage = TempStorage::new();
    let token = Token::parse("u1").unwrap();

    let store = Store::new();
    store.upsert(&token, |d| {
        d.conversations.merge(vec![conversation("c1", "hi"), conversation("c2", "yo")]);
        d.conversations.upsert(conversation("c1", "hi again"));
        d.conversations.delete("c2", 1_700_000_000);
        d.messages.merge(vec![message("m1", "c1", "hello")]);
    });

    PersistenceManager::new(storage.path()).save(&store).unwrap();

    let reloaded = Store::new();
    PersistenceManager::new(storage.path()).load_into(&reloaded);
    assert_eq!(reloaded.snapshot(), store.snapshot());

    let data = reloaded.get(&token).unwrap();
    assert!(data.collection(CollectionKind::Conversation).get("c1").unwrap().is_modified());
    assert_eq!(
        data.conversations
            .get("c2")
            .unwrap()
            .as_tombstone()
            .unwrap()
            .deleted_at_secs(),
        Some(1_700_000_000)
    );
}

#[test]
fn loads_files_written_by_earlier_servers() {
    let storage = TempStorage::new();
    std::fs::write(
        storage.path(),
        br#"{"u1":{"conversations":{"c1":{"id":"c1","title":"hi","modified":true}},
             "messages":{"m1":{"id":"m1","deleted":true,"deletedAt":1700000000}},
             "apiKeys":{"openai":"sk-x"}}}"#,
    )
    .unwrap();

    let store = Store::new();
    PersistenceManager::new(storage.path()).load_into(&store);
    let data = store.get(&Token::parse("u1").unwrap()).unwrap();
    assert!(data.conversations.get("c1").unwrap().is_modified());
    assert!(data.messages.get("m1").unwrap().is_tombstone());
    assert_eq!(data.api_keys["openai"], "sk-x");
}
