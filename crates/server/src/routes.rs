//! Route configuration and request tracking.

use crate::access_log::AccessEntry;
use crate::auth::{IdentityTag, auth_middleware};
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Request, State};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use std::net::SocketAddr;
use std::time::Instant;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Headroom for multipart framing on top of the configured upload limit.
/// The per-file limit itself is enforced while reading the file part.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let router = Router::new()
        // Management API
        .route(
            "/api/v1/packages",
            post(handlers::upload_package).get(handlers::list_packages),
        )
        .route(
            "/api/v1/packages/{repo}/{distribution}/{component}/{architecture}/{name}/{version}",
            get(handlers::get_package).delete(handlers::delete_package),
        )
        // Compatibility download route (implicit repo = "default")
        .route(
            "/repo/{distribution}/{component}/{architecture}/{filename}",
            get(handlers::download_package),
        )
        .route(
            "/api/v1/keys",
            post(handlers::create_key).get(handlers::list_keys),
        )
        .route("/api/v1/keys/{id}", delete(handlers::delete_key))
        // Probes (intentionally unauthenticated)
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(metrics_handler))
        // Apt tree
        .route(
            "/apt/{repo}/dists/{distribution}/Release",
            get(handlers::apt_release),
        )
        .route(
            "/apt/{repo}/dists/{distribution}/{component}/{binary_arch}/Packages",
            get(handlers::apt_packages),
        )
        .route(
            "/apt/{repo}/pool/{distribution}/{component}/{architecture}/{filename}",
            get(handlers::apt_pool),
        )
        .layer(DefaultBodyLimit::max(body_limit));

    // Middleware layers are applied in reverse order (outermost last).
    // Execution: TraceLayer -> CORS -> request tracking -> auth -> handler.
    let mut router = router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_requests,
        ));

    if let Some(cors) = cors_layer(&state.config.cors_origins) {
        router = router.layer(cors);
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Build a CORS layer from the configured origins. Empty config means no
/// CORS headers at all; `*` allows any origin.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let layer = if origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(parsed)
    };
    Some(
        layer
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}

/// Request-completion hook: updates the counters and writes the access
/// log line.
async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let url = req.uri().to_string();
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let response = next.run(req).await;

    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    state
        .metrics
        .observe_request(&method, status, latency_ms as f64);

    let key_id = response
        .extensions()
        .get::<IdentityTag>()
        .map(|tag| tag.0.clone());
    let ts = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    state.access_log.log(&AccessEntry {
        ts,
        method,
        url,
        status,
        latency_ms,
        ip,
        key_id,
    });

    response
}
