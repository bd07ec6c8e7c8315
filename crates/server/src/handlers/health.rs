//! Liveness and readiness probes.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// GET /healthz - process liveness.
pub async fn healthz() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// GET /readyz - readiness, gated on storage access.
pub async fn readyz(State(state): State<AppState>) -> Response {
    if state.store.is_ready().await {
        (
            StatusCode::OK,
            Json(json!({"status": "ready", "checks": {"storage": true}})),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unready", "checks": {"storage": false}})),
        )
            .into_response()
    }
}
