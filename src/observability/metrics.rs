//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_client_requests_total` (counter): completed requests by method, status
//! - `http_client_request_duration_seconds` (histogram): latency including retries
//! - `http_client_attempts` (histogram): network attempts per request
//! - `http_client_retries_total` (counter): retries by reason
//! - `http_cache_lookups_total` (counter): cache lookups by result
//! - `http_cache_entries` (gauge): stored entries
//! - `negotiation_responses_total` (counter): serialized payloads by encoding
//! - `negotiation_bytes_saved_total` (counter): bytes saved by compression

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request (success or terminal failure).
pub fn record_request(method: &str, status: u16, attempts: u32, start: Instant) {
    let (method, status) = (method.to_string(), status.to_string());
    counter!("http_client_requests_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    histogram!("http_client_request_duration_seconds", "method" => method, "status" => status)
        .record(start.elapsed().as_secs_f64());
    histogram!("http_client_attempts").record(f64::from(attempts));
}

/// Record one retry and why it happened (`status`, `connect`, `timeout`).
pub fn record_retry(reason: &'static str) {
    counter!("http_client_retries_total", "reason" => reason).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("http_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("http_cache_entries").set(entries as f64);
}

/// Record a negotiated payload and how much compression saved.
pub fn record_negotiation(encoding: &str, original_len: usize, final_len: usize) {
    counter!("negotiation_responses_total", "encoding" => encoding.to_string()).increment(1);
    let saved = original_len.saturating_sub(final_len) as u64;
    if saved > 0 {
        counter!("negotiation_bytes_saved_total", "encoding" => encoding.to_string())
            .increment(saved);
    }
}
