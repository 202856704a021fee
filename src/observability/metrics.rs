//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (requests, latency, build outcomes, compiles)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `bundle_requests_total` (counter): requests by route kind, status
//! - `bundle_request_duration_seconds` (histogram): latency distribution
//! - `bundle_builds_total` (counter): build cache outcomes
//! - `bundle_compiles_total` (counter): bundler runs by result
//! - `bundle_compile_duration_seconds` (histogram): bundler run time
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - Labels are low-cardinality (route kind, not path)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter serving on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one served request.
pub fn record_request(route: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "bundle_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("bundle_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

/// Record a build cache decision (`not_modified`, `cached`, `compiled`, `error`).
pub fn record_build(outcome: &'static str) {
    metrics::counter!("bundle_builds_total", "outcome" => outcome).increment(1);
}

/// Record one run of the bundler.
pub fn record_compile(success: bool, start: Instant) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("bundle_compiles_total", "result" => result).increment(1);
    metrics::histogram!("bundle_compile_duration_seconds").record(start.elapsed().as_secs_f64());
}
