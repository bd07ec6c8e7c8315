//! Prometheus metrics.
//!
//! The registry is an explicit collaborator created at startup and handed
//! around through [`crate::AppState`], so tests and embedders can hold
//! independent registries without global registration conflicts.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Process-wide counters and gauges.
pub struct Metrics {
    registry: Registry,
    pub requests_total: IntCounter,
    pub requests_by_method: IntCounterVec,
    pub requests_by_status: IntCounterVec,
    pub errors_total: IntCounter,
    pub upload_bytes: IntCounter,
    pub download_bytes: IntCounter,
    pub request_duration_ms: Histogram,
    pub storage_bytes: IntGauge,
    pub packages_total: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounter::new(
            "pository_requests_total",
            "Total number of HTTP requests served",
        )
        .expect("metric creation failed");
        let requests_by_method = IntCounterVec::new(
            Opts::new(
                "pository_requests_by_method_total",
                "HTTP requests by method",
            ),
            &["method"],
        )
        .expect("metric creation failed");
        let requests_by_status = IntCounterVec::new(
            Opts::new(
                "pository_requests_by_status_total",
                "HTTP requests by response status",
            ),
            &["status"],
        )
        .expect("metric creation failed");
        let errors_total = IntCounter::new(
            "pository_errors_total",
            "Total number of 4xx/5xx responses",
        )
        .expect("metric creation failed");
        let upload_bytes = IntCounter::new(
            "pository_upload_bytes_total",
            "Total bytes accepted through package uploads",
        )
        .expect("metric creation failed");
        let download_bytes = IntCounter::new(
            "pository_download_bytes_total",
            "Total bytes served through package downloads",
        )
        .expect("metric creation failed");
        let request_duration_ms = Histogram::with_opts(
            HistogramOpts::new(
                "pository_request_duration_ms",
                "Request latency in milliseconds",
            )
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]),
        )
        .expect("metric creation failed");
        let storage_bytes = IntGauge::new(
            "pository_storage_bytes_total",
            "Total bytes of stored package artifacts",
        )
        .expect("metric creation failed");
        let packages_total = IntGauge::new(
            "pository_packages_total",
            "Number of stored packages across all repos",
        )
        .expect("metric creation failed");

        for collector in [
            Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(requests_by_method.clone()),
            Box::new(requests_by_status.clone()),
            Box::new(errors_total.clone()),
            Box::new(upload_bytes.clone()),
            Box::new(download_bytes.clone()),
            Box::new(request_duration_ms.clone()),
            Box::new(storage_bytes.clone()),
            Box::new(packages_total.clone()),
        ] {
            registry
                .register(collector)
                .expect("metric registration failed");
        }

        Self {
            registry,
            requests_total,
            requests_by_method,
            requests_by_status,
            errors_total,
            upload_bytes,
            download_bytes,
            request_duration_ms,
            storage_bytes,
            packages_total,
        }
    }

    /// Record one finished request.
    pub fn observe_request(&self, method: &str, status: u16, latency_ms: f64) {
        self.requests_total.inc();
        self.requests_by_method.with_label_values(&[method]).inc();
        self.requests_by_status
            .with_label_values(&[&status.to_string()])
            .inc();
        if status >= 400 {
            self.errors_total.inc();
        }
        self.request_duration_ms.observe(latency_ms);
    }

    /// Encode all metrics in Prometheus text format 0.0.4.
    pub fn encode(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!(error = %e, "failed to encode metrics");
        }
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// GET /metrics - Prometheus scrape endpoint. Storage gauges are refreshed
/// from the store at scrape time.
pub async fn metrics_handler(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let stats = state.store.get_storage_stats().await?;
    state.metrics.storage_bytes.set(stats.total_size as i64);
    state.metrics.packages_total.set(stats.package_count as i64);

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.encode(),
    ))
}
