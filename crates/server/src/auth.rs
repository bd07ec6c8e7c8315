//! Authentication middleware.
//!
//! Resolution order: a `Bearer` token is verified as a workload identity;
//! otherwise `X-Api-Key` is checked against the key store. Health,
//! readiness, metrics and the apt tree are public; `/repo/...` downloads
//! become public when `authOnDownload` is off.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use pository_auth::{AuthError, KeyIdentity, KeyRole, WorkloadClaims};

/// The identity a request authenticated as.
#[derive(Clone, Debug)]
pub enum Identity {
    /// An API key (or the bootstrap admin secret).
    Key(KeyIdentity),
    /// A verified workload identity.
    Workload(WorkloadClaims),
}

impl Identity {
    /// The identity string recorded in metadata and access logs.
    pub fn id(&self) -> String {
        match self {
            Self::Key(key) => key.id.clone(),
            Self::Workload(claims) => claims.uploader_id(),
        }
    }

    /// Enforce a role requirement against this identity.
    ///
    /// Workload identities satisfy `read` only; their write access is
    /// decided by the upload policy, and they never hold `admin`.
    pub fn require_role(
        &self,
        required: KeyRole,
        repo: Option<&str>,
        distribution: Option<&str>,
    ) -> Result<(), ApiError> {
        match self {
            Self::Key(key) => {
                if key.has_permission(required, repo, distribution) {
                    Ok(())
                } else {
                    Err(ApiError::AuthForbidden(format!(
                        "requires {required} access"
                    )))
                }
            }
            Self::Workload(_) => {
                if required == KeyRole::Read {
                    Ok(())
                } else {
                    Err(ApiError::AuthForbidden(
                        "workload identities are limited to package uploads".to_string(),
                    ))
                }
            }
        }
    }
}

/// Identity string attached to the response for the access log.
#[derive(Clone, Debug)]
pub struct IdentityTag(pub String);

/// Paths that never require credentials.
fn is_public_path(path: &str, state: &AppState) -> bool {
    path == "/healthz"
        || path == "/readyz"
        || path == "/metrics"
        || path.starts_with("/apt/")
        || (!state.config.auth_on_download && path.starts_with("/repo/"))
}

/// Extract the bearer token from the Authorization header.
/// Per RFC 6750, the scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

/// Authentication middleware.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_public_path(req.uri().path(), &state) {
        return Ok(next.run(req).await);
    }

    let identity = if let Some(token) = extract_bearer_token(&req) {
        let verifier = state.oidc.as_ref().ok_or_else(|| {
            ApiError::AuthInvalid("workload identity is not configured".to_string())
        })?;
        // a slow or unreachable JWKS endpoint degrades to 401, not a stall
        let claims = verifier.verify(token).await.map_err(|e| match e {
            AuthError::TokenRejected(reason) => ApiError::AuthInvalid(reason),
            AuthError::JwksFetch(reason) => ApiError::AuthInvalid(format!("jwks: {reason}")),
            other => ApiError::Internal(other.to_string()),
        })?;
        Identity::Workload(claims)
    } else if let Some(presented) = req.headers().get("x-api-key") {
        let presented = presented
            .to_str()
            .map_err(|_| ApiError::AuthInvalid("malformed API key header".to_string()))?;
        let key = state
            .keys
            .validate_key(presented)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or_else(|| ApiError::AuthInvalid("unknown API key".to_string()))?;
        Identity::Key(key)
    } else {
        return Err(ApiError::AuthMissing);
    };

    let tag = IdentityTag(identity.id());
    req.extensions_mut().insert(identity);

    let mut response = next.run(req).await;
    response.extensions_mut().insert(tag);
    Ok(response)
}
