//! JSON-over-HTTP transport.
//!
//! The HTTP client itself is abstracted behind [`HttpClient`] so any HTTP
//! library can be plugged in. [`LoopbackClient`] routes requests straight to
//! an in-process server for tests.

use crate::error::{ClientError, ClientResult};
use crate::transport::SyncTransport;
use chatsync_protocol::{
    CheckClientMissingRequest, CheckClientMissingResponse, CheckServerMissingRequest,
    CheckServerMissingResponse, DeleteSingleItemRequest, Endpoint, GetItemsRequest,
    GetItemsResponse, SendItemsRequest, SendSingleItemRequest, SuccessResponse,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }
}

/// HTTP client abstraction.
///
/// `post` returns `Err` only when no response was received at all; error
/// statuses come back as an [`HttpResponse`].
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String>;

    /// Checks if the client is healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based sync transport with JSON bodies.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the sync server (e.g. "http://localhost:8084").
    base_url: String,
    client: C,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport. A trailing slash on `base_url` is ignored.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the URL of an endpoint.
    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// Returns the message of the last failed request, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn post_json<Req, Res>(&self, endpoint: Endpoint, request: &Req) -> ClientResult<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let body = serde_json::to_vec(request)
            .map_err(|e| ClientError::Protocol(format!("failed to encode request: {e}")))?;

        let url = self.url(endpoint);
        debug!(%url, bytes = body.len(), "sync request");
        let response = self.client.post(&url, body).map_err(|e| {
            *self.last_error.write() = Some(e.clone());
            ClientError::transport_retryable(e)
        })?;

        if !response.is_success() {
            let message = response.text();
            *self.last_error.write() = Some(message.clone());
            return Err(match response.status {
                400..=499 => ClientError::Rejected(message),
                500..=599 => ClientError::Server(message),
                status => ClientError::Protocol(format!("unexpected status {status}: {message}")),
            });
        }

        *self.last_error.write() = None;
        serde_json::from_slice(&response.body)
            .map_err(|e| ClientError::Protocol(format!("failed to decode response: {e}")))
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn check_client_missing(
        &self,
        request: &CheckClientMissingRequest,
    ) -> ClientResult<CheckClientMissingResponse> {
        self.post_json(Endpoint::CheckClientMissing, request)
    }

    fn get_items(&self, request: &GetItemsRequest) -> ClientResult<GetItemsResponse> {
        self.post_json(Endpoint::GetItems, request)
    }

    fn check_server_missing(
        &self,
        request: &CheckServerMissingRequest,
    ) -> ClientResult<CheckServerMissingResponse> {
        self.post_json(Endpoint::CheckServerMissing, request)
    }

    fn send_items(&self, request: &SendItemsRequest) -> ClientResult<SuccessResponse> {
        self.post_json(Endpoint::SendItems, request)
    }

    fn send_single_item(&self, request: &SendSingleItemRequest) -> ClientResult<SuccessResponse> {
        self.post_json(Endpoint::SendSingleItem, request)
    }

    fn delete_single_item(
        &self,
        request: &DeleteSingleItemRequest,
    ) -> ClientResult<SuccessResponse> {
        self.post_json(Endpoint::DeleteSingleItem, request)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    fn close(&self) -> ClientResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Trait for in-process servers that can answer loopback requests.
pub trait LoopbackServer {
    /// Handles a POST to `path` and returns the response.
    fn handle_post(&self, path: &str, body: &[u8]) -> HttpResponse;
}

/// An [`HttpClient`] that hands requests directly to an in-process server.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a loopback client connected to `server`.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        let path = url.find("/api/").map(|i| &url[i..]).unwrap_or(url);
        Ok(self.server.handle_post(path, &body))
    }

    fn is_healthy(&self) -> bool {
        true
    }
}
