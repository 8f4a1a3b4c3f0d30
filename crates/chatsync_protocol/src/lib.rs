//! # chatsync protocol
//!
//! Record model and wire types for the chatsync reconciliation protocol.
//!
//! This crate provides:
//! - [`Record`], a tagged union of live records and tombstones
//! - [`CollectionKind`] for the two synchronized collections
//! - Request/response messages for the six sync endpoints
//! - [`Endpoint`] with the HTTP paths shared by server and client
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Wire format
//!
//! Records travel as flat JSON objects. Two keys carry sync metadata:
//!
//! - `deleted` / `deletedAt` mark a tombstone, which never carries payload
//! - `modified` is a dirty flag, present only while set

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod error;
mod messages;
mod record;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    CheckClientMissingRequest, CheckClientMissingResponse, CheckServerMissingRequest,
    CheckServerMissingResponse, DeleteSingleItemRequest, Endpoint, GetItemsRequest,
    GetItemsResponse, IdsRequest, MissingIdsResponse, null_as_default, SendItemsRequest, SendSingleItemRequest,
    SuccessResponse, HEALTH_PATH,
};
pub use record::{
    is_reserved_field, CollectionKind, LiveRecord, RawRecord, Record, Tombstone, DELETED_AT_FIELD,
    DELETED_FIELD, ID_FIELD, MODIFIED_FIELD,
};
