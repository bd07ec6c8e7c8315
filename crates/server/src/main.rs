//! Pository server binary.

use anyhow::{Context, Result};
use clap::Parser;
use pository_auth::{ApiKeyStore, OidcVerifier};
use pository_server::bootstrap::{DEFAULT_CONFIG_PATH, ensure_directories, load_config};
use pository_server::{AccessLogger, AppState, create_router};
use pository_storage::PackageStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pository - an on-premises Debian package repository
#[derive(Parser, Debug)]
#[command(name = "positoryd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "POSITORY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Pository v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(std::path::Path::new(&args.config))?;
    ensure_directories(&config)
        .await
        .context("failed to create service directories")?;

    if config.tls.enabled {
        tracing::warn!(
            "TLS is enabled in configuration; termination is expected at a fronting proxy"
        );
    }
    if config.retention.enabled {
        tracing::warn!("retention policy configured but no collector runs yet");
    }

    let access_log = AccessLogger::open(&config.log_path)
        .with_context(|| format!("failed to open access log {}", config.log_path.display()))?;

    let store = PackageStore::new(&config.data_root)
        .await
        .context("failed to initialize storage")?;
    if !store.is_ready().await {
        anyhow::bail!(
            "storage at {} is not readable and writable",
            config.data_root.display()
        );
    }
    tracing::info!(data_root = %config.data_root.display(), "Storage engine initialized");

    let keys = ApiKeyStore::open(&config.api_keys_path, config.admin_key.clone())
        .await
        .context("failed to open API key store")?;
    tracing::info!(path = %config.api_keys_path.display(), "API key store loaded");

    let oidc = config.oidc_audience.clone().map(OidcVerifier::new);
    match &oidc {
        Some(_) => tracing::info!("Workload identity verification enabled"),
        None => tracing::info!("Workload identity verification disabled (no audience configured)"),
    }

    let bind = format!("{}:{}", config.bind_address, config.port);
    let state = AppState::new(config, Arc::new(store), Arc::new(keys), oidc, access_log);
    let app = create_router(state);

    let addr: SocketAddr = bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
