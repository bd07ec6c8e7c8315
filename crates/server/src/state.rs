//! Application state shared across handlers.

use crate::access_log::AccessLogger;
use crate::metrics::Metrics;
use pository_auth::{ApiKeyStore, OidcVerifier, UploadPolicy};
use pository_core::AppConfig;
use pository_storage::PackageStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Storage engine, sole owner of the data tree.
    pub store: Arc<PackageStore>,
    /// API key store.
    pub keys: Arc<ApiKeyStore>,
    /// Workload identity verifier, present when an audience is configured.
    pub oidc: Option<Arc<OidcVerifier>>,
    /// Upload policy for workload identities.
    pub policy: Arc<UploadPolicy>,
    /// Metrics registry.
    pub metrics: Arc<Metrics>,
    /// Access log stream.
    pub access_log: Arc<AccessLogger>,
}

impl AppState {
    /// Create application state from its collaborators.
    ///
    /// # Panics
    ///
    /// Panics if the configuration fails validation; startup should have
    /// validated already.
    pub fn new(
        config: AppConfig,
        store: Arc<PackageStore>,
        keys: Arc<ApiKeyStore>,
        oidc: Option<OidcVerifier>,
        access_log: AccessLogger,
    ) -> Self {
        if let Err(e) = config.validate() {
            panic!("invalid configuration: {e}");
        }
        let policy = UploadPolicy::from_config(&config);

        Self {
            config: Arc::new(config),
            store,
            keys,
            oidc: oidc.map(Arc::new),
            policy: Arc::new(policy),
            metrics: Arc::new(Metrics::new()),
            access_log: Arc::new(access_log),
        }
    }
}
