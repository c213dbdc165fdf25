//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mdx_proxy_requests_total` (counter): requests by status
//! - `mdx_proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `mdx_proxy_backend_duration_seconds` (histogram): backend time by outcome
//! - `mdx_proxy_rows_returned` (histogram): rows per successful query
//! - `mdx_proxy_backend_connections_open` (gauge): connections currently held

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished HTTP request.
pub fn record_request(status: u16, start: Instant) {
    let status = status.to_string();
    counter!("mdx_proxy_requests_total", "status" => status).increment(1);
    histogram!("mdx_proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record one backend round trip. `rows` is set for successful queries.
pub fn record_backend_call(outcome: &'static str, elapsed: Duration, rows: Option<usize>) {
    histogram!("mdx_proxy_backend_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
    if let Some(rows) = rows {
        histogram!("mdx_proxy_rows_returned").record(rows as f64);
    }
}

pub fn connection_opened() {
    gauge!("mdx_proxy_backend_connections_open").increment(1.0);
}

pub fn connection_released() {
    gauge!("mdx_proxy_backend_connections_open").decrement(1.0);
}
