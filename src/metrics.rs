//! Prometheus metrics.
//!
//! Recording goes through the `metrics` facade; the exporter is installed once
//! per process and its handle renders the `/metrics` endpoint.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder (first call only) and return its handle.
///
/// If another recorder is already installed globally, a detached recorder is
/// returned instead so rendering still works.
pub fn init() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Prometheus recorder not installed: {}", e);
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

pub fn record_request(endpoint: &'static str, status: u16) {
    counter!(
        "playgate_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("playgate_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

/// `kind`: `not_found`, `transient` or `failed`.
pub fn record_origin_error(kind: &'static str) {
    counter!("playgate_origin_errors_total", "kind" => kind).increment(1);
}

pub fn record_rewrite(kind: &'static str) {
    counter!("playgate_manifest_rewrites_total", "kind" => kind).increment(1);
}

pub fn record_cache(result: &'static str) {
    counter!("playgate_manifest_cache_total", "result" => result).increment(1);
}
