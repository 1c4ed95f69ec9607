//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, service
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//!
//! # Design Decisions
//! - Recording is unconditional; without an installed recorder the macros
//!   are no-ops, so tests and metrics-disabled deployments pay nothing
//! - Labels stay low-cardinality: service names, not full paths

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the global Prometheus recorder with its scrape endpoint.
pub fn init_metrics(address: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()?;
    tracing::info!(%address, "metrics exporter listening");
    Ok(())
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service.to_string(),
    )
    .increment(1);
    histogram!(
        "proxy_request_duration_seconds",
        "service" => service.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_without_recorder_is_a_noop() {
        record_request("GET", 200, "blog", Instant::now());
        record_request("POST", 502, "none", Instant::now());
    }
}
