//! Server test utilities.

use pository_auth::{ApiKeyStore, KeyRole, KeyScope};
use pository_core::AppConfig;
use pository_server::{AccessLogger, AppState, create_router};
use pository_storage::PackageStore;
use std::sync::Arc;
use tempfile::TempDir;

/// Bootstrap admin secret used by all tests.
pub const ADMIN_KEY: &str = "test-admin-secret";

/// A test server wrapper with all dependencies over a temp directory.
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

impl TestServer {
    /// Create a new test server with default test configuration.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");

        let mut config = AppConfig {
            data_root: temp_dir.path().join("data"),
            log_path: temp_dir.path().join("access.log"),
            api_keys_path: temp_dir.path().join("keys.json"),
            admin_key: Some(ADMIN_KEY.to_string()),
            max_upload_size: 8 * 1024 * 1024,
            ..Default::default()
        };
        modifier(&mut config);

        let store = PackageStore::new(&config.data_root)
            .await
            .expect("failed to create package store");
        let keys = ApiKeyStore::open(&config.api_keys_path, config.admin_key.clone())
            .await
            .expect("failed to open key store");
        let access_log =
            AccessLogger::open(&config.log_path).expect("failed to open access log");

        let state = AppState::new(config, Arc::new(store), Arc::new(keys), None, access_log);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Create an API key through the store and return its secret.
    pub async fn create_key(&self, role: KeyRole) -> String {
        let (_, secret) = self
            .state
            .keys
            .create_key(role, Some("test key".to_string()), None)
            .await
            .expect("failed to create key");
        secret
    }

    /// Create a scoped API key and return its secret.
    pub async fn create_scoped_key(&self, role: KeyRole, scope: KeyScope) -> String {
        let (_, secret) = self
            .state
            .keys
            .create_key(role, Some("scoped test key".to_string()), Some(scope))
            .await
            .expect("failed to create key");
        secret
    }
}
