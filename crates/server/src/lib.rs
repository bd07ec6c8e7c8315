//! HTTP server for Pository.
//!
//! This crate provides the HTTP surface:
//! - JSON management API for packages and keys
//! - apt-compatible `Release` / `Packages` / pool endpoints
//! - health, readiness and Prometheus metrics probes
//! - authentication middleware and JSON access logging

pub mod access_log;
pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use access_log::AccessLogger;
pub use auth::Identity;
pub use error::ApiError;
pub use metrics::Metrics;
pub use routes::create_router;
pub use state::AppState;
