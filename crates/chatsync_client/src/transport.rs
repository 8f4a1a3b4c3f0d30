//! Transport abstraction for the six sync operations.

use crate::error::ClientResult;
use chatsync_protocol::{
    CheckClientMissingRequest, CheckClientMissingResponse, CheckServerMissingRequest,
    CheckServerMissingResponse, DeleteSingleItemRequest, GetItemsRequest, GetItemsResponse,
    SendItemsRequest, SendSingleItemRequest, SuccessResponse,
};

/// A sync transport carries requests to the sync server.
///
/// This trait abstracts the network layer so the driver can run over HTTP,
/// an in-process server, or a test double.
pub trait SyncTransport: Send + Sync {
    /// Asks which server records the client lacks or holds stale.
    fn check_client_missing(
        &self,
        request: &CheckClientMissingRequest,
    ) -> ClientResult<CheckClientMissingResponse>;

    /// Fetches records by id.
    fn get_items(&self, request: &GetItemsRequest) -> ClientResult<GetItemsResponse>;

    /// Asks which client ids the server lacks.
    fn check_server_missing(
        &self,
        request: &CheckServerMissingRequest,
    ) -> ClientResult<CheckServerMissingResponse>;

    /// Bulk upsert.
    fn send_items(&self, request: &SendItemsRequest) -> ClientResult<SuccessResponse>;

    /// Upserts one record.
    fn send_single_item(&self, request: &SendSingleItemRequest) -> ClientResult<SuccessResponse>;

    /// Deletes one record.
    fn delete_single_item(&self, request: &DeleteSingleItemRequest)
        -> ClientResult<SuccessResponse>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport.
    fn close(&self) -> ClientResult<()>;
}
