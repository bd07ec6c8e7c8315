//! Configuration loading and startup plumbing.
//!
//! Layering, later overriding earlier: built-in defaults, the YAML file,
//! then the `POSITORY_*` environment variables. Environment values are
//! string-coerced; list values are comma-split.

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Format, Serialized, Yaml};
use pository_core::AppConfig;
use std::path::Path;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pository/config.yaml";

/// Load configuration from the given file (when present) and the process
/// environment.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
    if path.exists() {
        tracing::info!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Yaml::file(path));
    } else {
        tracing::debug!(config_path = %path.display(), "No config file found");
    }

    let mut config: AppConfig = figment
        .extract()
        .context("failed to load configuration")?;
    apply_env_overrides(&mut config, std::env::vars());
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Apply the recognized `POSITORY_*` overrides.
pub fn apply_env_overrides(
    config: &mut AppConfig,
    vars: impl Iterator<Item = (String, String)>,
) {
    for (key, value) in vars {
        match key.as_str() {
            "POSITORY_DATA_ROOT" => config.data_root = value.into(),
            "POSITORY_LOG_PATH" => config.log_path = value.into(),
            "POSITORY_PORT" => match value.parse() {
                Ok(port) => config.port = port,
                Err(_) => tracing::warn!(value = %value, "ignoring invalid POSITORY_PORT"),
            },
            "POSITORY_BIND_ADDRESS" => config.bind_address = value,
            "POSITORY_ADMIN_KEY" => config.admin_key = Some(value),
            "POSITORY_API_KEYS_PATH" => config.api_keys_path = value.into(),
            "POSITORY_TLS_CERT" => config.tls.cert = Some(value.into()),
            "POSITORY_TLS_KEY" => config.tls.key = Some(value.into()),
            "POSITORY_MAX_UPLOAD_SIZE" => match value.parse() {
                Ok(size) => config.max_upload_size = size,
                Err(_) => {
                    tracing::warn!(value = %value, "ignoring invalid POSITORY_MAX_UPLOAD_SIZE")
                }
            },
            "POSITORY_CORS_ORIGINS" => {
                config.cors_origins = split_list(&value);
            }
            _ => {}
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Create the directories the service writes into.
pub async fn ensure_directories(config: &AppConfig) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&config.data_root).await?;
    if let Some(parent) = config.log_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if let Some(parent) = config.api_keys_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}
