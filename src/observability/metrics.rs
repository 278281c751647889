//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sendfile_decisions_total` (counter): responses by outcome
//!   (`pass_through`, `file`, `blob`)
//! - `sendfile_delivery_failures_total` (counter): adapter failures by kind
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter runs its own listener, separate from proxy traffic

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one interceptor decision.
pub fn record_decision(outcome: &'static str) {
    metrics::counter!("sendfile_decisions_total", "outcome" => outcome).increment(1);
}

/// Count one failed delivery.
pub fn record_delivery_failure(kind: &str) {
    metrics::counter!("sendfile_delivery_failures_total", "kind" => kind.to_string()).increment(1);
}
