//! Benchmark datasets.

use chatsync_protocol::{LiveRecord, Record};
use chatsync_store::{Collection, Store, Token};

/// Id of the `i`-th generated record.
pub fn record_id(i: usize) -> String {
    format!("rec-{i:06}")
}

/// A chat message with a payload of roughly `payload` bytes.
pub fn message(i: usize, payload: usize) -> Record {
    LiveRecord::new(record_id(i))
        .with_field("conversationId", format!("conv-{:04}", i / 50))
        .with_field("role", if i % 2 == 0 { "user" } else { "assistant" })
        .with_field("content", "x".repeat(payload))
        .into()
}

/// A collection of `count` records where every tenth is a tombstone and
/// every seventh is dirty.
pub fn collection(count: usize, payload: usize) -> Collection {
    let mut c = Collection::new();
    c.merge((0..count).map(|i| message(i, payload)));
    for i in (0..count).step_by(7) {
        c.upsert(message(i, payload));
    }
    for i in (0..count).step_by(10) {
        c.delete(&record_id(i), 1_700_000_000);
    }
    c
}

/// Client id list covering every other server record plus `extra` unknown
/// ids.
pub fn client_ids(count: usize, extra: usize) -> Vec<String> {
    (0..count)
        .step_by(2)
        .chain(count..count + extra)
        .map(record_id)
        .collect()
}

/// A store with `tokens` users, each holding `per_token` messages.
pub fn store(tokens: usize, per_token: usize, payload: usize) -> Store {
    let store = Store::new();
    for t in 0..tokens {
        let Ok(token) = Token::parse(format!("token-{t:04}")) else {
            continue;
        };
        store.upsert(&token, |d| d.messages = collection(per_token, payload));
    }
    store
}
