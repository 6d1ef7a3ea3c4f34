//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define connection-manager metrics
//! - Expose a Prometheus-compatible endpoint when enabled
//!
//! # Metrics
//! - `dirsession_connection_state` (gauge): 0=disconnected, 1=connecting,
//!   2=connected, 3=failed, 4=reconnecting
//! - `dirsession_failures_total` (counter): classified failures by kind, origin
//! - `dirsession_reconnects_scheduled_total` (counter)
//! - `dirsession_retries_exhausted_total` (counter)
//! - `dirsession_health_probes_total` (counter): probes by result
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels are static strings only

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::connection::events::FailureOrigin;
use crate::connection::state::ConnectionState;
use crate::resilience::classifier::FailureKind;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_state(state: ConnectionState) {
    metrics::gauge!("dirsession_connection_state").set(state.as_metric());
}

pub fn record_failure(kind: FailureKind, origin: FailureOrigin) {
    metrics::counter!(
        "dirsession_failures_total",
        "kind" => kind.as_str(),
        "origin" => origin.as_str()
    )
    .increment(1);
}

pub fn record_reconnect_scheduled() {
    metrics::counter!("dirsession_reconnects_scheduled_total").increment(1);
}

pub fn record_retries_exhausted() {
    metrics::counter!("dirsession_retries_exhausted_total").increment(1);
}

pub fn record_health_probe(healthy: bool) {
    let result = if healthy { "ok" } else { "failed" };
    metrics::counter!("dirsession_health_probes_total", "result" => result).increment(1);
}
