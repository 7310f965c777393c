//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rewrite_requests_total` (counter): requests by outcome
//!   (`rewritten`, `resolved`, `unmatched`, `forwarded_unmatched`, `redirect`, `upstream_error`)
//! - `rewrite_request_duration_seconds` (histogram): gateway latency
//! - `rewrite_table_reloads_total` (counter): hot reloads by result
//! - `rewrite_table_rules` (gauge): rules in the active table
//!
//! Updates are no-ops until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(outcome: &'static str, start: Instant) {
    metrics::counter!("rewrite_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("rewrite_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_reload(result: &'static str) {
    metrics::counter!("rewrite_table_reloads_total", "result" => result).increment(1);
}

pub fn set_rule_count(rules: usize) {
    metrics::gauge!("rewrite_table_rules").set(rules as f64);
}
