//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pulse_traces_total` (counter): traced requests by method, status
//! - `pulse_trace_duration_ms` (histogram): traced request latency
//! - `pulse_ingest_failures_total` (counter): traces the backend rejected
//! - `pulse_stream_subscribers` (gauge): live subscribers per stream
//! - `pulse_trace_events_dropped_total` (counter): events lost to lagging subscribers
//! - `pulse_db_probe_latency_ms` (histogram): successful liveness probes
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_trace(method: &str, status: u16, duration_ms: f64) {
    metrics::counter!(
        "pulse_traces_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("pulse_trace_duration_ms").record(duration_ms);
}

pub fn record_ingest_failure() {
    metrics::counter!("pulse_ingest_failures_total").increment(1);
}

pub fn record_stream_subscribers(stream: &'static str, count: usize) {
    metrics::gauge!("pulse_stream_subscribers", "stream" => stream).set(count as f64);
}

pub fn record_trace_event_dropped() {
    metrics::counter!("pulse_trace_events_dropped_total").increment(1);
}

pub fn record_db_probe(latency_ms: f64) {
    metrics::histogram!("pulse_db_probe_latency_ms").record(latency_ms);
}
