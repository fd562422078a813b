//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatcher_requests_total` (counter): dispatched requests by outcome
//! - `dispatcher_request_duration_seconds` (histogram): dispatch latency by outcome
//! - `dispatcher_fallthrough_total` (counter): candidate routes abandoned
//!   because an argument did not coerce
//! - `dispatcher_active_connections` (gauge): current connection count
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is optional and serves its own HTTP listener

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "dispatcher_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "dispatcher_request_duration_seconds";
pub const FALLTHROUGH_TOTAL: &str = "dispatcher_fallthrough_total";
pub const ACTIVE_CONNECTIONS: &str = "dispatcher_active_connections";

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    ::metrics::describe_counter!(REQUESTS_TOTAL, "Dispatched requests by outcome");
    ::metrics::describe_histogram!(
        REQUEST_DURATION_SECONDS,
        ::metrics::Unit::Seconds,
        "Time spent dispatching a request"
    );
    ::metrics::describe_counter!(FALLTHROUGH_TOTAL, "Routes skipped after a failed argument coercion");
    ::metrics::describe_gauge!(ACTIVE_CONNECTIONS, "Open client connections");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished dispatch.
pub fn record_dispatch(outcome: &'static str, elapsed: Duration) {
    ::metrics::counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
    ::metrics::histogram!(REQUEST_DURATION_SECONDS, "outcome" => outcome).record(elapsed.as_secs_f64());
}

pub fn record_fallthrough() {
    ::metrics::counter!(FALLTHROUGH_TOTAL).increment(1);
}

pub fn set_active_connections(count: u64) {
    ::metrics::gauge!(ACTIVE_CONNECTIONS).set(count as f64);
}
