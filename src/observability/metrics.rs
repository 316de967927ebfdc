//! Metrics collection and exposition.
//!
//! # Metrics
//! - `caddyfile_sync_cycles_total` (counter): reconciliation cycles by outcome
//! - `caddyfile_sync_discovery_errors_total` (counter): failed discovery calls by source
//! - `caddyfile_sync_resource_errors_total` (counter): resources excluded from a cycle
//! - `caddyfile_sync_resources_total` (gauge): resources that contributed to the last cycle
//! - `caddyfile_sync_swarm_available` (gauge): 1 when cluster mode is usable
//! - `caddyfile_sync_document_bytes` (gauge): size of the last generated document

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    if let Err(e) = builder.install() {
        tracing::error!(error = %e, "Failed to install Prometheus recorder");
    } else {
        tracing::info!(address = %addr, "Metrics exporter listening");
    }
}

/// Record the outcome of one reconciliation cycle.
pub fn record_cycle(outcome: &'static str) {
    counter!("caddyfile_sync_cycles_total", "outcome" => outcome).increment(1);
}

/// Record a failed discovery call.
pub fn record_discovery_error(source: &'static str) {
    counter!("caddyfile_sync_discovery_errors_total", "source" => source).increment(1);
}

/// Record a resource excluded from the current cycle.
pub fn record_resource_error(kind: &'static str) {
    counter!("caddyfile_sync_resource_errors_total", "kind" => kind).increment(1);
}

/// Record how many resources contributed directives.
pub fn record_resources(count: usize) {
    gauge!("caddyfile_sync_resources_total").set(count as f64);
}

/// Record cluster-mode availability.
pub fn record_swarm_available(available: bool) {
    gauge!("caddyfile_sync_swarm_available").set(if available { 1.0 } else { 0.0 });
}

/// Record the generated document size.
pub fn record_document_size(bytes: usize) {
    gauge!("caddyfile_sync_document_bytes").set(bytes as f64);
}
