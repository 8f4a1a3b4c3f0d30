//! # chatsync server
//!
//! HTTP reconciliation server for chatsync.
//!
//! This crate provides:
//! - [`RequestHandler`] implementing the six reconciliation operations
//! - [`SaveSignal`] and [`BackgroundSaver`], which move all disk writes off
//!   the request path
//! - An axum router with CORS, request tracing and a body limit
//! - [`SyncServer`], tying storage, handler and transport together
//!
//! ## Endpoints
//!
//! | Path | Lock | Effect |
//! |---|---|---|
//! | `POST /api/sync/check-client-missing` | shared | none |
//! | `POST /api/sync/get-items` | exclusive | clears dirty flags |
//! | `POST /api/sync/check-server-missing` | shared | none |
//! | `POST /api/sync/send-items` | exclusive | bulk upsert |
//! | `POST /api/sync/send-single-item` | exclusive | upsert, flags overwrites |
//! | `POST /api/sync/delete-single-item` | exclusive | tombstones |
//! | `GET /health` | none | none |

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod http;
mod saver;
mod server;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use error::{ServerError, ServerResult};
pub use handler::RequestHandler;
pub use http::{build_router, HEALTH_BODY};
pub use saver::{BackgroundSaver, SaveSignal};
pub use server::SyncServer;
