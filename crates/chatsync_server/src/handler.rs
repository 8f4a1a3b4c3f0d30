//! Request handlers for the six reconciliation operations.
//!
//! Handlers are synchronous: each takes the store lock it needs, applies the
//! operation, releases the lock and then signals the background saver. No
//! handler performs I/O.

use crate::error::{ServerError, ServerResult};
use crate::saver::SaveSignal;
use chatsync_protocol::{
    CheckClientMissingRequest, CheckClientMissingResponse, CheckServerMissingRequest,
    CheckServerMissingResponse, CollectionKind, DeleteSingleItemRequest, Endpoint,
    GetItemsRequest, GetItemsResponse, ProtocolError, RawRecord, Record, SendItemsRequest,
    SendSingleItemRequest, SuccessResponse, ID_FIELD,
};
use chatsync_store::{unix_now, Store, Token};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handler for sync requests.
///
/// Cheap to clone; clones share the same store and save signal.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    store: Arc<Store>,
    saves: Arc<SaveSignal>,
}

impl RequestHandler {
    /// Creates a handler over `store`, reporting mutations to `saves`.
    pub fn new(store: Arc<Store>, saves: Arc<SaveSignal>) -> Self {
        Self { store, saves }
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Returns the save signal.
    pub fn save_signal(&self) -> &Arc<SaveSignal> {
        &self.saves
    }

    /// Reports the server records the client must fetch.
    ///
    /// An unseen token yields empty lists.
    pub fn check_client_missing(
        &self,
        request: CheckClientMissingRequest,
    ) -> ServerResult<CheckClientMissingResponse> {
        let token = parse_token(&request.token)?;
        let response = self
            .store
            .read(&token, |data| CheckClientMissingResponse {
                missing_conversation_ids: data
                    .conversations
                    .missing_on_client(&request.conversation_ids),
                missing_message_ids: data.messages.missing_on_client(&request.message_ids),
            })
            .unwrap_or_default();

        debug!(
            %token,
            conversations = response.missing_conversation_ids.len(),
            messages = response.missing_message_ids.len(),
            "check-client-missing"
        );
        Ok(response)
    }

    /// Returns the requested records, consuming their dirty flags.
    pub fn get_items(&self, request: GetItemsRequest) -> ServerResult<GetItemsResponse> {
        let token = parse_token(&request.token)?;
        let fetched = self.store.update(&token, |data| {
            let conversations = data.conversations.fetch(&request.conversation_ids);
            let messages = data.messages.fetch(&request.message_ids);
            (conversations, messages)
        });

        let Some((conversations, messages)) = fetched else {
            debug!(%token, "get-items for unknown token");
            return Ok(GetItemsResponse::default());
        };

        let cleared = conversations.cleared + messages.cleared;
        debug!(
            %token,
            conversations = conversations.records.len(),
            messages = messages.records.len(),
            cleared,
            "get-items"
        );
        if cleared > 0 {
            self.saves.request_save();
        }

        Ok(GetItemsResponse {
            conversations: conversations.records,
            messages: messages.records,
        })
    }

    /// Reports the client ids the server lacks entirely.
    ///
    /// An unseen token lacks everything, so the client's lists come back
    /// unchanged.
    pub fn check_server_missing(
        &self,
        request: CheckServerMissingRequest,
    ) -> ServerResult<CheckServerMissingResponse> {
        let token = parse_token(&request.token)?;
        let response = self.store.read(&token, |data| CheckServerMissingResponse {
            missing_conversation_ids: data
                .conversations
                .missing_on_server(&request.conversation_ids),
            missing_message_ids: data.messages.missing_on_server(&request.message_ids),
        });

        let response = response.unwrap_or_else(|| CheckServerMissingResponse {
            missing_conversation_ids: request.conversation_ids,
            missing_message_ids: request.message_ids,
        });
        debug!(
            %token,
            conversations = response.missing_conversation_ids.len(),
            messages = response.missing_message_ids.len(),
            "check-server-missing"
        );
        Ok(response)
    }

    /// Bulk upsert. Tombstoned ids are skipped; nothing is flagged modified.
    pub fn send_items(&self, request: SendItemsRequest) -> ServerResult<SuccessResponse> {
        let token = parse_token(&request.token)?;
        let conversations = keyed_records(CollectionKind::Conversation, request.conversations);
        let messages = keyed_records(CollectionKind::Message, request.messages);

        let (conversations, messages) = self.store.upsert(&token, |data| {
            (
                data.conversations.merge(conversations),
                data.messages.merge(messages),
            )
        });

        debug!(
            %token,
            conversations_applied = conversations.applied,
            conversations_discarded = conversations.discarded,
            messages_applied = messages.applied,
            messages_discarded = messages.discarded,
            "send-items"
        );
        self.saves.request_save();
        Ok(SuccessResponse::ok())
    }

    /// Upserts one record per supplied collection, flagging overwrites as
    /// modified. A tombstoned id is a silent no-op.
    pub fn send_single_item(&self, request: SendSingleItemRequest) -> ServerResult<SuccessResponse> {
        let token = parse_token(&request.token)?;

        // Validate everything before touching the store.
        let mut records = Vec::with_capacity(2);
        for kind in CollectionKind::ALL {
            if let Some(obj) = request.record(kind) {
                let record = Record::from_object(obj.clone()).map_err(|e| match e {
                    ProtocolError::MissingId => ServerError::id_required(kind),
                    other => ServerError::InvalidRequest(other.to_string()),
                })?;
                records.push((kind, record));
            }
        }
        if records.is_empty() {
            return Err(ServerError::InvalidRequest(
                "Either conversation or message must be provided".into(),
            ));
        }

        let outcomes = self.store.upsert(&token, |data| {
            records
                .into_iter()
                .map(|(kind, record)| {
                    let id = record.id().to_string();
                    (kind, id, data.collection_mut(kind).upsert(record))
                })
                .collect::<Vec<_>>()
        });

        for (kind, id, outcome) in &outcomes {
            debug!(%token, %kind, id = %id, ?outcome, "send-single-item");
        }
        self.saves.request_save();
        Ok(SuccessResponse::ok())
    }

    /// Tombstones the named records. Unknown and already-deleted ids are
    /// no-ops.
    pub fn delete_single_item(
        &self,
        request: DeleteSingleItemRequest,
    ) -> ServerResult<SuccessResponse> {
        let token = parse_token(&request.token)?;
        let targets: Vec<(CollectionKind, &str)> = CollectionKind::ALL
            .into_iter()
            .filter_map(|kind| request.id(kind).map(|id| (kind, id)))
            .collect();
        if targets.is_empty() {
            return Err(ServerError::InvalidRequest(
                "Either conversationId or messageId must be provided".into(),
            ));
        }

        let now = unix_now();
        let outcomes = self.store.update(&token, |data| {
            targets
                .iter()
                .map(|&(kind, id)| (kind, id, data.collection_mut(kind).delete(id, now)))
                .collect::<Vec<_>>()
        });

        match outcomes {
            Some(outcomes) => {
                for (kind, id, outcome) in outcomes {
                    debug!(%token, %kind, id, ?outcome, "delete-single-item");
                }
            }
            None => debug!(%token, "delete-single-item for unknown token"),
        }
        self.saves.request_save();
        Ok(SuccessResponse::ok())
    }

    /// Decodes a JSON request body for `endpoint`, runs the operation and
    /// encodes the JSON response.
    pub fn handle_json(&self, endpoint: Endpoint, body: &[u8]) -> ServerResult<Vec<u8>> {
        match endpoint {
            Endpoint::CheckClientMissing => encode(&self.check_client_missing(decode(body)?)?),
            Endpoint::GetItems => encode(&self.get_items(decode(body)?)?),
            Endpoint::CheckServerMissing => encode(&self.check_server_missing(decode(body)?)?),
            Endpoint::SendItems => encode(&self.send_items(decode(body)?)?),
            Endpoint::SendSingleItem => encode(&self.send_single_item(decode(body)?)?),
            Endpoint::DeleteSingleItem => encode(&self.delete_single_item(decode(body)?)?),
        }
    }
}

fn parse_token(raw: &str) -> ServerResult<Token> {
    Token::parse(raw).map_err(|_| ServerError::token_required())
}

/// Interprets a bulk map, using each key as the record identity.
fn keyed_records(kind: CollectionKind, raw: BTreeMap<String, RawRecord>) -> Vec<Record> {
    let mut records = Vec::with_capacity(raw.len());
    for (key, obj) in raw {
        if let Some(Value::String(id)) = obj.get(ID_FIELD) {
            if id != &key {
                warn!(%kind, key = %key, id = %id, "record id disagrees with its key, using key");
            }
        }
        match Record::from_keyed_object(&key, obj) {
            Ok(record) => records.push(record),
            Err(_) => warn!(%kind, "skipping record with empty key"),
        }
    }
    records
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> ServerResult<T> {
    serde_json::from_slice(body).map_err(ServerError::malformed_body)
}

fn encode<T: Serialize>(response: &T) -> ServerResult<Vec<u8>> {
    serde_json::to_vec(response).map_err(|e| ServerError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_protocol::{IdsRequest, LiveRecord};
    use serde_json::json;

    fn handler() -> RequestHandler {
        RequestHandler::new(Arc::new(Store::new()), Arc::new(SaveSignal::new()))
    }

    fn live(id: &str, title: &str) -> Record {
        LiveRecord::new(id).with_field("title", title).into()
    }

    fn send_conversation(h: &RequestHandler, token: &str, record: &Record) {
        h.send_single_item(SendSingleItemRequest::new(
            token,
            CollectionKind::Conversation,
            record,
        ))
        .unwrap();
    }

    fn get_conversations(h: &RequestHandler, token: &str, ids: &[&str]) -> GetItemsResponse {
        h.get_items(IdsRequest::new(token).with_conversation_ids(ids.iter().copied()))
            .unwrap()
    }

    #[test]
    fn token_is_required_everywhere() {
        let h = handler();
        for endpoint in Endpoint::ALL {
            let err = h.handle_json(endpoint, br#"{"token": ""}"#).unwrap_err();
            assert!(err.is_client_error(), "{endpoint:?}");
            assert_eq!(err.public_message(), "Token is required");

            let err = h.handle_json(endpoint, b"{}").unwrap_err();
            assert_eq!(err.public_message(), "Token is required");
        }
    }

    #[test]
    fn malformed_json_is_client_error() {
        let err = handler()
            .handle_json(Endpoint::GetItems, b"{not json")
            .unwrap_err();
        assert!(err.is_client_error());
        assert!(err.public_message().starts_with("failed to parse JSON"));
    }

    #[test]
    fn concrete_scenario() {
        let h = handler();
        send_conversation(&h, "u1", &live("c1", "hi"));

        let items = get_conversations(&h, "u1", &["c1"]);
        assert_eq!(
            serde_json::to_value(&items.conversations["c1"]).unwrap(),
            json!({"id": "c1", "title": "hi"})
        );

        h.delete_single_item(DeleteSingleItemRequest::new(
            "u1",
            CollectionKind::Conversation,
            "c1",
        ))
        .unwrap();

        let items = get_conversations(&h, "u1", &["c1"]);
        let value = serde_json::to_value(&items.conversations["c1"]).unwrap();
        assert_eq!(value["deleted"], json!(true));
        assert!(value["deletedAt"].is_i64());
        assert!(value.get("title").is_none());

        send_conversation(&h, "u1", &live("c1", "resurrected"));
        let again = get_conversations(&h, "u1", &["c1"]);
        assert_eq!(again, items);
    }

    #[test]
    fn single_update_is_reported_until_fetched() {
        let h = handler();
        send_conversation(&h, "u1", &live("c1", "v1"));
        send_conversation(&h, "u1", &live("c1", "v2"));

        let check = || {
            h.check_client_missing(IdsRequest::new("u1").with_conversation_ids(["c1"]))
                .unwrap()
        };
        assert_eq!(check().missing_conversation_ids, ["c1"]);

        let items = get_conversations(&h, "u1", &["c1"]);
        assert!(!items.conversations["c1"].is_modified());
        assert!(check().is_empty());
    }

    #[test]
    fn first_single_send_is_not_reported_as_stale() {
        let h = handler();
        h.handle_json(
            Endpoint::SendSingleItem,
            br#"{"token":"u1","conversation":{"id":"c1","title":"hi","modified":true}}"#,
        )
        .unwrap();

        let missing = h
            .check_client_missing(IdsRequest::new("u1").with_conversation_ids(["c1"]))
            .unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn bulk_upsert_does_not_flag_and_respects_tombstones() {
        let h = handler();
        let send = |title: &str| {
            h.send_items(
                SendItemsRequest::new("u1")
                    .with_record(CollectionKind::Conversation, &live("c1", title))
                    .with_record(CollectionKind::Message, &live("m1", title)),
            )
            .unwrap()
        };
        send("v1");
        send("v2");
        let check = IdsRequest::new("u1")
            .with_conversation_ids(["c1"])
            .with_message_ids(["m1"]);
        assert!(h.check_client_missing(check.clone()).unwrap().is_empty());

        h.delete_single_item(DeleteSingleItemRequest::new("u1", CollectionKind::Message, "m1"))
            .unwrap();
        send("v3");

        let missing = h.check_client_missing(check).unwrap();
        assert_eq!(missing.missing_message_ids, ["m1"]);
        let data = h.store().get(&Token::parse("u1").unwrap()).unwrap();
        assert!(data.messages.get("m1").unwrap().is_tombstone());
    }

    #[test]
    fn bulk_keys_are_identity() {
        let h = handler();
        let body = json!({
            "token": "u1",
            "conversations": {
                "c1": {"title": "no id"},
                "c2": {"id": "other", "title": "wrong id"},
                "": {"id": "", "title": "skipped"}
            }
        });
        h.handle_json(Endpoint::SendItems, &serde_json::to_vec(&body).unwrap())
            .unwrap();

        let data = h.store().get(&Token::parse("u1").unwrap()).unwrap();
        assert_eq!(data.conversations.len(), 2);
        assert_eq!(data.conversations.get("c2").unwrap().id(), "c2");
        assert!(data.conversations.get("other").is_none());
    }

    #[test]
    fn send_single_item_validation() {
        let h = handler();
        let err = h
            .handle_json(Endpoint::SendSingleItem, br#"{"token":"u1"}"#)
            .unwrap_err();
        assert_eq!(
            err.public_message(),
            "Either conversation or message must be provided"
        );

        let err = h
            .handle_json(
                Endpoint::SendSingleItem,
                br#"{"token":"u1","conversation":{"id":"c1"},"message":{"content":"x"}}"#,
            )
            .unwrap_err();
        assert_eq!(err.public_message(), "Message ID is required");
        // Nothing was applied, and no data was created for the token.
        assert_eq!(h.store().token_count(), 0);
    }

    #[test]
    fn send_single_item_with_both_records() {
        let h = handler();
        h.handle_json(
            Endpoint::SendSingleItem,
            br#"{"token":"u1","conversation":{"id":"c1"},"message":{"id":"m1"}}"#,
        )
        .unwrap();

        let data = h.store().get(&Token::parse("u1").unwrap()).unwrap();
        assert!(data.conversations.get("c1").is_some());
        assert!(data.messages.get("m1").is_some());
    }

    #[test]
    fn delete_validation_and_idempotence() {
        let h = handler();
        let err = h
            .handle_json(Endpoint::DeleteSingleItem, br#"{"token":"u1","conversationId":""}"#)
            .unwrap_err();
        assert_eq!(
            err.public_message(),
            "Either conversationId or messageId must be provided"
        );

        // Unknown token and unknown id are no-ops.
        let delete = DeleteSingleItemRequest::new("u1", CollectionKind::Conversation, "c1");
        assert!(h.delete_single_item(delete.clone()).unwrap().success);
        assert_eq!(h.store().token_count(), 0);

        send_conversation(&h, "u1", &live("c1", "hi"));
        h.delete_single_item(delete.clone()).unwrap();
        let once = h.store().snapshot();
        h.delete_single_item(delete).unwrap();
        assert_eq!(h.store().snapshot(), once);
    }

    #[test]
    fn duality() {
        let h = handler();
        h.send_items(
            SendItemsRequest::new("u1")
                .with_record(CollectionKind::Conversation, &live("A", "a"))
                .with_record(CollectionKind::Conversation, &live("B", "b")),
        )
        .unwrap();

        let request = IdsRequest::new("u1").with_conversation_ids(["B", "C"]);
        let server_missing = h.check_server_missing(request.clone()).unwrap();
        assert_eq!(server_missing.missing_conversation_ids, ["C"]);
        let client_missing = h.check_client_missing(request).unwrap();
        assert_eq!(client_missing.missing_conversation_ids, ["A"]);
    }

    #[test]
    fn unseen_token() {
        let h = handler();
        let request = IdsRequest::new("nobody")
            .with_conversation_ids(["x", "y"])
            .with_message_ids(["m"]);

        assert!(h.check_client_missing(request.clone()).unwrap().is_empty());
        let server_missing = h.check_server_missing(request.clone()).unwrap();
        assert_eq!(server_missing.missing_conversation_ids, ["x", "y"]);
        assert_eq!(server_missing.missing_message_ids, ["m"]);
        assert_eq!(h.get_items(request).unwrap(), GetItemsResponse::default());
        assert_eq!(h.store().token_count(), 0);
    }

    #[test]
    fn saves_requested_by_mutations() {
        let h = handler();
        let saves = Arc::clone(h.save_signal());

        h.check_client_missing(IdsRequest::new("u1")).unwrap();
        assert_eq!(saves.requested(), 0);

        send_conversation(&h, "u1", &live("c1", "v1"));
        assert_eq!(saves.requested(), 1);

        // Fetching a clean record changes nothing on disk.
        get_conversations(&h, "u1", &["c1"]);
        assert_eq!(saves.requested(), 1);

        send_conversation(&h, "u1", &live("c1", "v2"));
        get_conversations(&h, "u1", &["c1"]);
        assert_eq!(saves.requested(), 3);
    }
}
