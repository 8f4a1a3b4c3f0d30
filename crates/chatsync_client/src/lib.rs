//! # chatsync client
//!
//! Client-side reconciliation driver for chatsync.
//!
//! This crate provides:
//! - [`SyncTransport`], one method per sync endpoint
//! - [`HttpTransport`], JSON over any [`HttpClient`] implementation
//! - [`LocalReplica`] and the in-memory [`MemoryReplica`]
//! - [`SyncClient`], which runs pull, push and single-item writes
//!
//! ## Sync model
//!
//! The server is authoritative for deletions. A pull always runs before a
//! push, so a record deleted elsewhere is removed locally before the push
//! could offer it back; the server's tombstone guard discards it anyway.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod client;
mod config;
mod error;
mod http;
mod replica;
mod transport;

pub use client::{PullOutcome, PushOutcome, SyncClient, SyncReport, SyncState, SyncStats};
pub use config::{ClientConfig, RetryConfig};
pub use error::{ClientError, ClientResult};
pub use http::{HttpClient, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer};
pub use replica::{LocalReplica, MemoryReplica};
pub use transport::SyncTransport;
