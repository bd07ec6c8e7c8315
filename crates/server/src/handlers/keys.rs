//! API key management endpoints. All require admin.

use crate::auth::Identity;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pository_auth::{KeyInfo, KeyRole, KeyScope};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub role: KeyRole,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scope: Option<KeyScope>,
}

/// The creation response is the only place the secret ever appears.
#[derive(Debug, Serialize)]
pub struct CreatedKey {
    #[serde(flatten)]
    pub info: KeyInfo,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct KeyList {
    pub keys: Vec<KeyInfo>,
}

/// POST /api/v1/keys - create a key.
pub async fn create_key(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreateKeyRequest>,
) -> ApiResult<Response> {
    identity.require_role(KeyRole::Admin, None, None)?;

    let (info, secret) = state
        .keys
        .create_key(request.role, request.description, request.scope)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(key_id = %info.id, role = %info.role, "API key created");
    Ok((StatusCode::CREATED, Json(CreatedKey { info, key: secret })).into_response())
}

/// GET /api/v1/keys - list keys. Hashes are never included.
pub async fn list_keys(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<KeyList>> {
    identity.require_role(KeyRole::Admin, None, None)?;
    Ok(Json(KeyList {
        keys: state.keys.list_keys().await,
    }))
}

/// DELETE /api/v1/keys/{id} - revoke a key.
pub async fn delete_key(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    identity.require_role(KeyRole::Admin, None, None)?;

    if state
        .keys
        .delete_key(&id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
    {
        tracing::info!(key_id = %id, "API key revoked");
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(ApiError::NotFound(format!("key {id}")))
    }
}
