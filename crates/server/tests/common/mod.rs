//! Shared test utilities.
//! Note: #[allow(dead_code)] because each test file compiles common/ separately.
#![allow(dead_code)]

pub mod fixtures;
pub mod server;

pub use server::TestServer;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

/// Send a request and collect the full response body.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body)
}

/// Helper for JSON requests, optionally authenticated with an API key.
pub async fn json_request(
    router: &Router,
    method: &str,
    uri: &str,
    api_key: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("X-Api-Key", key);
    }
    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let (status, bytes) = send(router, builder.body(body).unwrap()).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// GET a plain-text document (the apt surface).
pub async fn get_text(router: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = send(router, request).await;
    (status, String::from_utf8_lossy(&bytes).to_string())
}

/// Multipart package upload.
pub async fn upload(
    router: &Router,
    api_key: &str,
    fields: &[(&str, &str)],
    filename: &str,
    deb: &[u8],
) -> (StatusCode, Value) {
    let body = fixtures::multipart_body(fields, filename, deb);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/packages")
        .header("X-Api-Key", api_key)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", fixtures::BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, bytes) = send(router, request).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
