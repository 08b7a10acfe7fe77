//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, connections, pool activity)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): relayed requests by status
//! - `proxy_request_duration_seconds` (histogram): relay latency
//! - `proxy_active_connections` (gauge): current client connection count
//! - `proxy_pool_acquire_total` (counter): acquisitions by source (idle, dial)
//! - `proxy_pool_dial_failures_total` (counter): failed origin dials
//! - `proxy_pool_release_total` (counter): releases by outcome (queued, discarded)
//! - `proxy_backend_closed_total` (counter): backends closed by reason
//! - `proxy_pool_idle` (gauge): idle backends in the pool
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are low-cardinality only; paths are never used as labels

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one relayed request.
pub fn record_request(status: u16, start: Instant) {
    metrics::counter!("proxy_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record the current number of client connections.
pub fn record_active_connections(count: u64) {
    metrics::gauge!("proxy_active_connections").set(count as f64);
}

/// Record where an acquired backend came from ("idle" or "dial").
pub fn record_acquire(source: &'static str) {
    metrics::counter!("proxy_pool_acquire_total", "source" => source).increment(1);
}

pub fn record_dial_failure() {
    metrics::counter!("proxy_pool_dial_failures_total").increment(1);
}

/// Record a release outcome ("queued" or "discarded") and the resulting idle count.
pub fn record_release(outcome: &'static str, idle: usize) {
    metrics::counter!("proxy_pool_release_total", "outcome" => outcome).increment(1);
    metrics::gauge!("proxy_pool_idle").set(idle as f64);
}

pub fn record_backend_closed(reason: &'static str) {
    metrics::counter!("proxy_backend_closed_total", "reason" => reason).increment(1);
}

pub fn record_pool_idle(idle: usize) {
    metrics::gauge!("proxy_pool_idle").set(idle as f64);
}
