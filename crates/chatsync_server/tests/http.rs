//! Router tests through `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chatsync_protocol::{Endpoint, GetItemsResponse, MissingIdsResponse};
use chatsync_server::{build_router, RequestHandler, SaveSignal};
use chatsync_store::Store;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn router() -> Router {
    let handler = RequestHandler::new(Arc::new(Store::new()), Arc::new(SaveSignal::new()));
    build_router(handler, 1024 * 1024)
}

async fn call(router: &Router, method: Method, path: &str, body: impl Into<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::ORIGIN, "http://localhost:3000")
        .body(body.into())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec(), headers)
}

async fn post_json(router: &Router, endpoint: Endpoint, body: Value) -> (StatusCode, Vec<u8>) {
    let (status, bytes, _) = call(router, Method::POST, endpoint.path(), body.to_string()).await;
    (status, bytes)
}

#[tokio::test]
async fn health_check() {
    let (status, body, _) = call(&router(), Method::GET, "/health", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn sync_round_trip_over_http() {
    let router = router();

    let (status, body) = post_json(
        &router,
        Endpoint::SendSingleItem,
        json!({"token": "u1", "conversation": {"id": "c1", "title": "hi"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"success": true}));

    let (status, body) = post_json(
        &router,
        Endpoint::CheckClientMissing,
        json!({"token": "u1", "conversationIds": [], "messageIds": []}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let missing: MissingIdsResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(missing.missing_conversation_ids, ["c1"]);

    let (status, body) = post_json(
        &router,
        Endpoint::GetItems,
        json!({"token": "u1", "conversationIds": ["c1"]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let raw: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(raw["conversations"]["c1"], json!({"id": "c1", "title": "hi"}));
    let items: GetItemsResponse = serde_json::from_slice(&body).unwrap();
    assert!(items.messages.is_empty());
}

#[tokio::test]
async fn missing_token_is_plain_text_400() {
    let (status, body) = post_json(&router(), Endpoint::GetItems, json!({"conversationIds": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"Token is required");
}

#[tokio::test]
async fn malformed_body_is_400() {
    let (status, body, headers) =
        call(&router(), Method::POST, Endpoint::SendItems.path(), "{\"token\":").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8(body).unwrap().starts_with("failed to parse JSON"));
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn wrong_method_is_405() {
    for endpoint in Endpoint::ALL {
        let (status, _, _) = call(&router(), Method::GET, endpoint.path(), Body::empty()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{endpoint:?}");
    }
}

#[tokio::test]
async fn preflight_short_circuits_with_cors_headers() {
    let (status, _, headers) =
        call(&router(), Method::OPTIONS, Endpoint::SendItems.path(), Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    assert!(methods.contains("POST"));
    assert!(methods.contains("DELETE"));
}

#[tokio::test]
async fn cors_headers_on_errors_too() {
    let (status, _, headers) = call(
        &router(),
        Method::POST,
        Endpoint::DeleteSingleItem.path(),
        "{}",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let handler = RequestHandler::new(Arc::new(Store::new()), Arc::new(SaveSignal::new()));
    let router = build_router(handler, 64);
    let big = json!({"token": "u1", "conversations": {"c1": {"title": "x".repeat(200)}}});
    let (status, _) = post_json(&router, Endpoint::SendItems, big).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
