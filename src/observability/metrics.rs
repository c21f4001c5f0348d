//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): completed requests by method, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_rate_limited_total` (counter): rejections by key kind (user, ip)
//! - `gateway_rate_limit_degraded_total` (counter): fail-open admissions by reason
//! - `gateway_audit_failures_total` (counter): dropped audit entries by sink
//! - `gateway_upstream_errors_total` (counter): upstream failures by service
//!
//! Key values (user ids, addresses) are never used as labels.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(key_kind: &'static str) {
    metrics::counter!("gateway_rate_limited_total", "key_kind" => key_kind).increment(1);
}

pub fn record_rate_limit_degraded(reason: &'static str) {
    metrics::counter!("gateway_rate_limit_degraded_total", "reason" => reason).increment(1);
}

pub fn record_audit_failure(sink: &'static str) {
    metrics::counter!("gateway_audit_failures_total", "sink" => sink).increment(1);
}

pub fn record_upstream_error(service: &str) {
    metrics::counter!("gateway_upstream_errors_total", "service" => service.to_string()).increment(1);
}
