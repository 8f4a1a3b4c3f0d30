//! axum transport.

use crate::error::ServerError;
use crate::handler::RequestHandler;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, MethodRouter};
use axum::Router;
use chatsync_protocol::{Endpoint, HEALTH_PATH};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Body of a healthy `/health` response.
pub const HEALTH_BODY: &str = "OK";

/// Builds the router serving the six sync endpoints and the health check.
///
/// Sync endpoints accept POST only; other methods get 405. Bodies are
/// decoded as JSON whatever their `Content-Type`.
pub fn build_router(handler: RequestHandler, max_body_size: usize) -> Router {
    let mut router = Router::new().route(HEALTH_PATH, get(health));
    for endpoint in Endpoint::ALL {
        router = router.route(endpoint.path(), sync_route(endpoint));
    }

    router
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .with_state(handler)
}

fn sync_route(endpoint: Endpoint) -> MethodRouter<RequestHandler> {
    post(move |State(handler): State<RequestHandler>, body: Bytes| async move {
        let json = handler.handle_json(endpoint, &body)?;
        Ok::<_, ServerError>(([(header::CONTENT_TYPE, "application/json")], json))
    })
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn health() -> &'static str {
    HEALTH_BODY
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, self.public_message()).into_response()
    }
}
