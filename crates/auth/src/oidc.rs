//! Workload identity token verification.
//!
//! Verifies RS256 JWTs minted by the CI platform's OIDC provider against
//! its published JWKS. The key set is fetched lazily on first use, cached,
//! and refreshed once when a token references an unknown key id. The fetch
//! carries a short timeout so a slow provider degrades to a 401 instead of
//! stalling the auth path.

use crate::error::{AuthError, Result};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;

/// Fixed token issuer.
pub const OIDC_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// Fixed JWKS document location.
pub const OIDC_JWKS_URI: &str = "https://token.actions.githubusercontent.com/.well-known/jwks";

/// Upper bound on a JWKS fetch.
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// The claims of interest from a verified workflow token.
#[derive(Clone, Debug, Deserialize)]
pub struct WorkloadClaims {
    /// `<owner>/<repo>` of the workflow run.
    pub repository: String,
    #[serde(default)]
    pub repository_visibility: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub workflow: Option<String>,
}

impl WorkloadClaims {
    /// The `<owner>` half of `repository`.
    pub fn owner(&self) -> Option<&str> {
        self.repository.split_once('/').map(|(owner, _)| owner)
    }

    /// The `<repo>` half of `repository`.
    pub fn repo_name(&self) -> Option<&str> {
        self.repository.split_once('/').map(|(_, name)| name)
    }

    /// The identity string recorded as uploader.
    pub fn uploader_id(&self) -> String {
        format!("oidc:{}", self.repository)
    }
}

/// Verifier for externally issued workflow tokens.
pub struct OidcVerifier {
    audience: String,
    issuer: String,
    jwks_uri: String,
    client: reqwest::Client,
    cache: RwLock<Option<JwkSet>>,
}

impl OidcVerifier {
    /// Verifier against the fixed provider endpoints.
    pub fn new(audience: impl Into<String>) -> Self {
        Self::with_endpoints(audience, OIDC_ISSUER, OIDC_JWKS_URI)
    }

    /// Verifier with explicit endpoints, for alternate deployments and
    /// tests.
    pub fn with_endpoints(
        audience: impl Into<String>,
        issuer: impl Into<String>,
        jwks_uri: impl Into<String>,
    ) -> Self {
        Self {
            audience: audience.into(),
            issuer: issuer.into(),
            jwks_uri: jwks_uri.into(),
            client: reqwest::Client::builder()
                .timeout(JWKS_FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
            cache: RwLock::new(None),
        }
    }

    /// Verify signature, issuer, audience and expiry; return the claims.
    pub async fn verify(&self, token: &str) -> Result<WorkloadClaims> {
        let header =
            decode_header(token).map_err(|e| AuthError::TokenRejected(format!("header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::TokenRejected(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::TokenRejected("missing key id".to_string()))?;

        let jwk = self.find_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| AuthError::TokenRejected(format!("jwk: {e}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<WorkloadClaims>(token, &key, &validation)
            .map_err(|e| AuthError::TokenRejected(e.to_string()))?;
        Ok(data.claims)
    }

    /// Look up `kid` in the cached key set, refreshing it once on a miss.
    async fn find_key(&self, kid: &str) -> Result<Jwk> {
        if let Some(jwks) = self.cache.read().await.as_ref()
            && let Some(jwk) = jwks.find(kid)
        {
            return Ok(jwk.clone());
        }

        let jwks = self.fetch_jwks().await?;
        let found = jwks.find(kid).cloned();
        *self.cache.write().await = Some(jwks);

        found.ok_or_else(|| AuthError::TokenRejected(format!("unknown key id {kid}")))
    }

    async fn fetch_jwks(&self) -> Result<JwkSet> {
        let response = self
            .client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::JwksFetch(e.to_string()))?;
        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::JwksFetch(e.to_string()))
    }
}
