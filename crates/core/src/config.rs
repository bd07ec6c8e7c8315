//! Configuration types shared across crates.
//!
//! The YAML file uses camelCase keys; snake_case aliases are accepted so
//! programmatic overrides can use either spelling.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// TLS configuration surface.
///
/// Termination is expected at a fronting proxy; the fields are validated
/// and surfaced so deployments can keep cert paths next to the rest of the
/// service configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub cert: Option<PathBuf>,
    #[serde(default)]
    pub key: Option<PathBuf>,
}

/// Retention policy fields. Parsed and validated; no collector runs yet.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, alias = "keep_last_n")]
    pub keep_last_n: Option<u32>,
    #[serde(default, alias = "max_age_days")]
    pub max_age_days: Option<u32>,
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root of the package data tree.
    #[serde(default = "default_data_root", rename = "dataRoot", alias = "data_root")]
    pub data_root: PathBuf,
    /// Access log destination (newline-delimited JSON).
    #[serde(default = "default_log_path", rename = "logPath", alias = "log_path")]
    pub log_path: PathBuf,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address (e.g. "0.0.0.0").
    #[serde(default = "default_bind_address", rename = "bindAddress", alias = "bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload_size", rename = "maxUploadSize", alias = "max_upload_size")]
    pub max_upload_size: u64,
    /// Repos accepted for upload and download. Empty means no restriction.
    #[serde(default, rename = "allowedRepos", alias = "allowed_repos")]
    pub allowed_repos: Vec<String>,
    /// CORS origins; `*` allows any origin, empty disables CORS headers.
    #[serde(default, rename = "corsOrigins", alias = "cors_origins")]
    pub cors_origins: Vec<String>,
    /// Bootstrap admin secret. Matching it authenticates as `admin`.
    #[serde(default, rename = "adminKey", alias = "admin_key")]
    pub admin_key: Option<String>,
    /// Path of the API key store JSON file.
    #[serde(default = "default_api_keys_path", rename = "apiKeysPath", alias = "api_keys_path")]
    pub api_keys_path: PathBuf,
    /// Whether `/repo/...` downloads require a `read` credential.
    #[serde(default = "default_auth_on_download", rename = "authOnDownload", alias = "auth_on_download")]
    pub auth_on_download: bool,
    /// Expected audience of workload-identity tokens. Verification is
    /// disabled when unset.
    #[serde(default, rename = "oidcAudience", alias = "oidc_audience")]
    pub oidc_audience: Option<String>,
    /// Owners whose workflows may upload under the default convention.
    #[serde(default, rename = "oidcAllowedOwners", alias = "oidc_allowed_owners")]
    pub oidc_allowed_owners: Vec<String>,
    /// Require `repository_visibility == "private"` under the default rule.
    #[serde(default, rename = "oidcRequirePrivate", alias = "oidc_require_private")]
    pub oidc_require_private: bool,
    /// Per-repository package allow-lists, `<owner>/<repo>` to package
    /// names (or `["*"]`).
    #[serde(default, rename = "oidcOverrides", alias = "oidc_overrides")]
    pub oidc_overrides: HashMap<String, Vec<String>>,
}

fn default_data_root() -> PathBuf {
    PathBuf::from("/var/lib/pository/data")
}

fn default_log_path() -> PathBuf {
    PathBuf::from("/var/log/pository/access.log")
}

fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_max_upload_size() -> u64 {
    256 * 1024 * 1024
}

fn default_api_keys_path() -> PathBuf {
    PathBuf::from("/var/lib/pository/keys.json")
}

fn default_auth_on_download() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            log_path: default_log_path(),
            port: default_port(),
            bind_address: default_bind_address(),
            tls: TlsConfig::default(),
            retention: RetentionConfig::default(),
            max_upload_size: default_max_upload_size(),
            allowed_repos: Vec::new(),
            cors_origins: Vec::new(),
            admin_key: None,
            api_keys_path: default_api_keys_path(),
            auth_on_download: default_auth_on_download(),
            oidc_audience: None,
            oidc_allowed_owners: Vec::new(),
            oidc_require_private: false,
            oidc_overrides: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Validate configuration invariants.
    pub fn validate(&self) -> crate::Result<()> {
        if self.tls.enabled && (self.tls.cert.is_none() || self.tls.key.is_none()) {
            return Err(crate::Error::InvalidConfig(
                "tls.enabled requires both tls.cert and tls.key".to_string(),
            ));
        }
        if self.max_upload_size == 0 {
            return Err(crate::Error::InvalidConfig(
                "maxUploadSize must be greater than zero".to_string(),
            ));
        }
        if self.retention.enabled
            && self.retention.keep_last_n.is_none()
            && self.retention.max_age_days.is_none()
        {
            return Err(crate::Error::InvalidConfig(
                "retention.enabled requires keepLastN or maxAgeDays".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `repo` may be used, given the allow-list.
    pub fn repo_allowed(&self, repo: &str) -> bool {
        self.allowed_repos.is_empty() || self.allowed_repos.iter().any(|r| r == repo)
    }
}
