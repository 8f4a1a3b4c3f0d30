//! Property-based test generators using proptest.
//!
//! Ids are drawn from a small alphabet so that independently generated
//! lists overlap often enough to exercise the diff rules.

use chatsync_protocol::{LiveRecord, Record};
use proptest::prelude::*;

/// Strategy for record ids.
pub fn record_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-f][0-9]").expect("Invalid regex")
}

/// Strategy for id lists (duplicates allowed).
pub fn id_list_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(record_id_strategy(), 0..12)
}

/// Strategy for live records with a few payload fields.
pub fn live_record_strategy() -> impl Strategy<Value = Record> {
    (
        record_id_strategy(),
        prop::string::string_regex("[a-zA-Z ]{0,16}").expect("Invalid regex"),
        any::<i32>(),
    )
        .prop_map(|(id, title, n)| {
            LiveRecord::new(id)
                .with_field("title", title)
                .with_field("n", n)
                .into()
        })
}

/// Strategy for batches of live records.
pub fn record_batch_strategy() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(live_record_strategy(), 0..10)
}
