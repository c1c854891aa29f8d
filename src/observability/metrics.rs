//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): client responses by status
//! - `proxy_request_duration_seconds` (histogram): time from request head to response
//! - `proxy_upstream_failures_total` (counter): failed attempts by pool and stage
//! - `proxy_upstream_connections_total` (counter): sessions used, by whether they were reused
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until a recorder is installed
//! - The Prometheus exporter serves its own HTTP listener, outside the worker pool

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and start its scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// One response written to a client.
pub fn record_request(status: u16, started: Instant) {
    ::metrics::counter!("proxy_requests_total", "status" => status.to_string()).increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds").record(started.elapsed().as_secs_f64());
}

/// One failed forwarding attempt.
pub fn record_upstream_failure(pool: &str, stage: &'static str) {
    ::metrics::counter!(
        "proxy_upstream_failures_total",
        "pool" => pool.to_string(),
        "stage" => stage
    )
    .increment(1);
}

/// One upstream session used for a request.
pub fn record_upstream_connection(reused: bool) {
    let reused = if reused { "true" } else { "false" };
    ::metrics::counter!("proxy_upstream_connections_total", "reused" => reused).increment(1);
}
