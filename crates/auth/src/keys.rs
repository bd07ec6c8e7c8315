//! Persistent API key store.
//!
//! Keys live in a single JSON file `{ "keys": [...] }`. The secret is
//! returned exactly once at creation; only its Argon2id hash is stored.
//! Verification is CPU-bound, so it runs on the blocking pool and stops at
//! the first matching key.

use crate::error::{AuthError, Result};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng as SaltRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Role hierarchy: each role implies everything below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRole {
    Read,
    Write,
    Admin,
}

impl KeyRole {
    fn rank(self) -> u8 {
        match self {
            Self::Read => 1,
            Self::Write => 2,
            Self::Admin => 3,
        }
    }

    /// Whether this role satisfies `required`.
    pub fn satisfies(self, required: KeyRole) -> bool {
        self.rank() >= required.rank()
    }

    /// Get the string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for KeyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional restriction of a key to repos and/or distributions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyScope {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repos: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distributions: Vec<String>,
}

impl KeyScope {
    /// Whether the scope admits the given repo/distribution pair. An empty
    /// axis imposes no restriction on that axis.
    pub fn permits(&self, repo: Option<&str>, distribution: Option<&str>) -> bool {
        let repo_ok = self.repos.is_empty()
            || repo.is_none_or(|r| self.repos.iter().any(|allowed| allowed == r));
        let dist_ok = self.distributions.is_empty()
            || distribution.is_none_or(|d| self.distributions.iter().any(|allowed| allowed == d));
        repo_ok && dist_ok
    }
}

/// A stored key, hash included. Never serialized onto the API.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub id: String,
    pub hash: String,
    pub role: KeyRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<KeyScope>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_used: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The API-facing view of a key. Carries everything except the hash.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub id: String,
    pub role: KeyRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<KeyScope>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_used: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&ApiKey> for KeyInfo {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id.clone(),
            role: key.role,
            scope: key.scope.clone(),
            created_at: key.created_at,
            last_used: key.last_used,
            description: key.description.clone(),
        }
    }
}

/// The identity a validated credential resolves to.
#[derive(Clone, Debug)]
pub struct KeyIdentity {
    pub id: String,
    pub role: KeyRole,
    pub scope: Option<KeyScope>,
}

impl KeyIdentity {
    /// Role hierarchy plus scope membership.
    pub fn has_permission(
        &self,
        required: KeyRole,
        repo: Option<&str>,
        distribution: Option<&str>,
    ) -> bool {
        if !self.role.satisfies(required) {
            return false;
        }
        match &self.scope {
            Some(scope) => scope.permits(repo, distribution),
            None => true,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    keys: Vec<ApiKey>,
}

/// Persistent key store guarded by a single mutex; operations are short.
pub struct ApiKeyStore {
    path: PathBuf,
    admin_key: Option<String>,
    state: Mutex<KeyFile>,
}

impl ApiKeyStore {
    /// Open the store, loading the file when it exists.
    pub async fn open(path: impl AsRef<Path>, admin_key: Option<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| AuthError::StoreCorrupt(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => KeyFile::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            admin_key,
            state: Mutex::new(state),
        })
    }

    /// Create a key. The returned secret is shown once and never stored.
    pub async fn create_key(
        &self,
        role: KeyRole,
        description: Option<String>,
        scope: Option<KeyScope>,
    ) -> Result<(KeyInfo, String)> {
        let id = random_hex(8);
        let secret = random_hex(32);

        let secret_for_hash = secret.clone();
        let hash = tokio::task::spawn_blocking(move || hash_secret(&secret_for_hash))
            .await
            .map_err(|e| AuthError::Hash(format!("hashing task failed: {e}")))??;

        let key = ApiKey {
            id,
            hash,
            role,
            scope,
            created_at: OffsetDateTime::now_utc(),
            last_used: None,
            description,
        };
        let info = KeyInfo::from(&key);

        let mut state = self.state.lock().await;
        state.keys.push(key);
        self.persist(&state).await?;
        Ok((info, secret))
    }

    /// Resolve a presented secret to an identity.
    ///
    /// The bootstrap admin secret short-circuits to a synthetic `admin`
    /// identity. Otherwise the presented secret is verified against each
    /// stored hash until the first match; stored hashes that fail to parse
    /// are skipped. A match updates `lastUsed`.
    pub async fn validate_key(&self, presented: &str) -> Result<Option<KeyIdentity>> {
        if let Some(admin) = &self.admin_key
            && admin == presented
        {
            return Ok(Some(KeyIdentity {
                id: "admin".to_string(),
                role: KeyRole::Admin,
                scope: None,
            }));
        }

        let candidates: Vec<(String, String)> = {
            let state = self.state.lock().await;
            state
                .keys
                .iter()
                .map(|k| (k.id.clone(), k.hash.clone()))
                .collect()
        };

        let presented = presented.to_string();
        let matched: Option<String> = tokio::task::spawn_blocking(move || {
            candidates
                .into_iter()
                .find(|(_, hash)| verify_secret(&presented, hash))
                .map(|(id, _)| id)
        })
        .await
        .map_err(|e| AuthError::Hash(format!("verification task failed: {e}")))?;

        let Some(id) = matched else {
            return Ok(None);
        };

        let mut state = self.state.lock().await;
        let Some(key) = state.keys.iter_mut().find(|k| k.id == id) else {
            // revoked between verification and bookkeeping
            return Ok(None);
        };
        key.last_used = Some(OffsetDateTime::now_utc());
        let identity = KeyIdentity {
            id: key.id.clone(),
            role: key.role,
            scope: key.scope.clone(),
        };
        self.persist(&state).await?;
        Ok(Some(identity))
    }

    /// Revoke a key. Returns whether it existed.
    pub async fn delete_key(&self, id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.keys.len();
        state.keys.retain(|k| k.id != id);
        let removed = state.keys.len() != before;
        if removed {
            self.persist(&state).await?;
        }
        Ok(removed)
    }

    /// All keys, without hashes.
    pub async fn list_keys(&self) -> Vec<KeyInfo> {
        let state = self.state.lock().await;
        state.keys.iter().map(KeyInfo::from).collect()
    }

    async fn persist(&self, state: &KeyFile) -> Result<()> {
        let mut data = serde_json::to_vec_pretty(state)?;
        data.push(b'\n');
        write_atomic(&self.path, &data).await?;
        Ok(())
    }
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut SaltRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

fn verify_secret(secret: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        // invalid stored hashes are silently skipped
        Err(_) => false,
    }
}

/// Write via a temporary sibling, then rename into place.
async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");
    let result = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, path).await
    }
    .await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&temp_path).await;
    }
    result
}
