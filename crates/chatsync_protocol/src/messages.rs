//! Protocol messages for the six sync endpoints.

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::{CollectionKind, RawRecord, Record};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Path of the health-check endpoint.
pub const HEALTH_PATH: &str = "/health";

/// The sync endpoints. Each one is served as its own POST path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Which server records does the client lack (or hold stale)?
    CheckClientMissing,
    /// Fetch records by id (clears dirty flags).
    GetItems,
    /// Which client ids does the server lack entirely?
    CheckServerMissing,
    /// Bulk upsert.
    SendItems,
    /// Upsert one record, flagging updates as modified.
    SendSingleItem,
    /// Replace one record with a tombstone.
    DeleteSingleItem,
}

impl Endpoint {
    /// All endpoints.
    pub const ALL: [Endpoint; 6] = [
        Endpoint::CheckClientMissing,
        Endpoint::GetItems,
        Endpoint::CheckServerMissing,
        Endpoint::SendItems,
        Endpoint::SendSingleItem,
        Endpoint::DeleteSingleItem,
    ];

    /// Returns the HTTP path.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::CheckClientMissing => "/api/sync/check-client-missing",
            Endpoint::GetItems => "/api/sync/get-items",
            Endpoint::CheckServerMissing => "/api/sync/check-server-missing",
            Endpoint::SendItems => "/api/sync/send-items",
            Endpoint::SendSingleItem => "/api/sync/send-single-item",
            Endpoint::DeleteSingleItem => "/api/sync/delete-single-item",
        }
    }

    /// Resolves a path to an endpoint.
    pub fn from_path(path: &str) -> ProtocolResult<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.path() == path)
            .ok_or_else(|| ProtocolError::UnknownEndpoint(path.to_string()))
    }
}

/// Treats an explicit JSON `null` like an absent field.
///
/// For use with `#[serde(default, deserialize_with = "...")]`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A token plus one id list per collection.
///
/// Shared by CheckClientMissing, GetItems and CheckServerMissing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdsRequest {
    /// User namespace.
    #[serde(default, deserialize_with = "null_as_default")]
    pub token: String,
    /// Conversation ids.
    #[serde(default, deserialize_with = "null_as_default")]
    pub conversation_ids: Vec<String>,
    /// Message ids.
    #[serde(default, deserialize_with = "null_as_default")]
    pub message_ids: Vec<String>,
}

impl IdsRequest {
    /// Creates an empty request for a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Sets the conversation ids.
    pub fn with_conversation_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conversation_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the message ids.
    pub fn with_message_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.message_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the id list for a collection.
    pub fn ids(&self, kind: CollectionKind) -> &[String] {
        match kind {
            CollectionKind::Conversation => &self.conversation_ids,
            CollectionKind::Message => &self.message_ids,
        }
    }
}

/// Request body of CheckClientMissing.
pub type CheckClientMissingRequest = IdsRequest;
/// Request body of GetItems.
pub type GetItemsRequest = IdsRequest;
/// Request body of CheckServerMissing.
pub type CheckServerMissingRequest = IdsRequest;

/// Missing ids per collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingIdsResponse {
    /// Missing conversation ids.
    #[serde(default, deserialize_with = "null_as_default")]
    pub missing_conversation_ids: Vec<String>,
    /// Missing message ids.
    #[serde(default, deserialize_with = "null_as_default")]
    pub missing_message_ids: Vec<String>,
}

impl MissingIdsResponse {
    /// Returns the missing ids for a collection.
    pub fn ids(&self, kind: CollectionKind) -> &[String] {
        match kind {
            CollectionKind::Conversation => &self.missing_conversation_ids,
            CollectionKind::Message => &self.missing_message_ids,
        }
    }

    /// Returns true if nothing is missing.
    pub fn is_empty(&self) -> bool {
        self.missing_conversation_ids.is_empty() && self.missing_message_ids.is_empty()
    }
}

/// Response body of CheckClientMissing.
pub type CheckClientMissingResponse = MissingIdsResponse;
/// Response body of CheckServerMissing.
pub type CheckServerMissingResponse = MissingIdsResponse;

/// Records returned by GetItems, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetItemsResponse {
    /// Conversations.
    #[serde(default, deserialize_with = "null_as_default")]
    pub conversations: BTreeMap<String, Record>,
    /// Messages.
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: BTreeMap<String, Record>,
}

impl GetItemsResponse {
    /// Returns the records for a collection.
    pub fn records(&self, kind: CollectionKind) -> &BTreeMap<String, Record> {
        match kind {
            CollectionKind::Conversation => &self.conversations,
            CollectionKind::Message => &self.messages,
        }
    }
}

/// Bulk upsert body. Values are raw objects; the map key is the identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendItemsRequest {
    /// User namespace.
    #[serde(default, deserialize_with = "null_as_default")]
    pub token: String,
    /// Conversations by id.
    #[serde(default, deserialize_with = "null_as_default")]
    pub conversations: BTreeMap<String, RawRecord>,
    /// Messages by id.
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: BTreeMap<String, RawRecord>,
}

impl SendItemsRequest {
    /// Creates an empty bulk upsert for a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Adds a record to the matching collection.
    pub fn with_record(mut self, kind: CollectionKind, record: &Record) -> Self {
        self.records_mut(kind)
            .insert(record.id().to_string(), record.to_object());
        self
    }

    /// Returns the raw records for a collection.
    pub fn records(&self, kind: CollectionKind) -> &BTreeMap<String, RawRecord> {
        match kind {
            CollectionKind::Conversation => &self.conversations,
            CollectionKind::Message => &self.messages,
        }
    }

    fn records_mut(&mut self, kind: CollectionKind) -> &mut BTreeMap<String, RawRecord> {
        match kind {
            CollectionKind::Conversation => &mut self.conversations,
            CollectionKind::Message => &mut self.messages,
        }
    }
}

/// Single-record upsert body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendSingleItemRequest {
    /// User namespace.
    #[serde(default, deserialize_with = "null_as_default")]
    pub token: String,
    /// Conversation to store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<RawRecord>,
    /// Message to store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<RawRecord>,
}

impl SendSingleItemRequest {
    /// Creates a request carrying one record.
    pub fn new(token: impl Into<String>, kind: CollectionKind, record: &Record) -> Self {
        let obj = Some(record.to_object());
        let (conversation, message) = match kind {
            CollectionKind::Conversation => (obj, None),
            CollectionKind::Message => (None, obj),
        };
        Self {
            token: token.into(),
            conversation,
            message,
        }
    }

    /// Returns the raw record for a collection, if supplied.
    pub fn record(&self, kind: CollectionKind) -> Option<&RawRecord> {
        match kind {
            CollectionKind::Conversation => self.conversation.as_ref(),
            CollectionKind::Message => self.message.as_ref(),
        }
    }
}

/// Single-record delete body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSingleItemRequest {
    /// User namespace.
    #[serde(default, deserialize_with = "null_as_default")]
    pub token: String,
    /// Conversation to delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Message to delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl DeleteSingleItemRequest {
    /// Creates a request deleting one record.
    pub fn new(token: impl Into<String>, kind: CollectionKind, id: impl Into<String>) -> Self {
        let id = Some(id.into());
        let (conversation_id, message_id) = match kind {
            CollectionKind::Conversation => (id, None),
            CollectionKind::Message => (None, id),
        };
        Self {
            token: token.into(),
            conversation_id,
            message_id,
        }
    }

    /// Returns the id to delete for a collection. Empty strings count as absent.
    pub fn id(&self, kind: CollectionKind) -> Option<&str> {
        let id = match kind {
            CollectionKind::Conversation => self.conversation_id.as_deref(),
            CollectionKind::Message => self.message_id.as_deref(),
        };
        id.filter(|id| !id.is_empty())
    }
}

/// Acknowledgement returned by the mutating endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Always true on a 200 response.
    pub success: bool,
}

impl SuccessResponse {
    /// A successful acknowledgement.
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LiveRecord;
    use serde_json::json;

    #[test]
    fn endpoint_paths_resolve() {
        for endpoint in Endpoint::ALL {
            assert_eq!(Endpoint::from_path(endpoint.path()).unwrap(), endpoint);
        }
        assert!(Endpoint::from_path("/api/sync/nope").is_err());
    }

    #[test]
    fn ids_request_wire_names() {
        let req: IdsRequest = serde_json::from_value(json!({
            "token": "u1",
            "conversationIds": ["a", "b"],
            "messageIds": null
        }))
        .unwrap();
        assert_eq!(req.token, "u1");
        assert_eq!(req.ids(CollectionKind::Conversation), ["a", "b"]);
        assert!(req.message_ids.is_empty());
    }

    #[test]
    fn missing_token_decodes_as_empty() {
        let req: IdsRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.token.is_empty());
    }

    #[test]
    fn missing_ids_response_wire_names() {
        let resp = MissingIdsResponse {
            missing_conversation_ids: vec!["a".into()],
            missing_message_ids: vec![],
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"missingConversationIds": ["a"], "missingMessageIds": []})
        );
        assert!(!resp.is_empty());
    }

    #[test]
    fn send_single_item_carries_one_record() {
        let record: Record = LiveRecord::new("m1").with_field("content", "hey").into();
        let req = SendSingleItemRequest::new("u1", CollectionKind::Message, &record);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({"token": "u1", "message": {"id": "m1", "content": "hey"}})
        );
        assert!(req.record(CollectionKind::Conversation).is_none());
    }

    #[test]
    fn delete_request_ignores_empty_ids() {
        let req: DeleteSingleItemRequest = serde_json::from_value(json!({
            "token": "u1",
            "conversationId": "",
            "messageId": "m1"
        }))
        .unwrap();
        assert_eq!(req.id(CollectionKind::Conversation), None);
        assert_eq!(req.id(CollectionKind::Message), Some("m1"));
    }

    #[test]
    fn send_items_keyed_by_id() {
        let record: Record = LiveRecord::new("c1").with_field("title", "hi").into();
        let req = SendItemsRequest::new("u1").with_record(CollectionKind::Conversation, &record);
        assert!(req.records(CollectionKind::Conversation).contains_key("c1"));
        assert!(req.records(CollectionKind::Message).is_empty());
    }
}
