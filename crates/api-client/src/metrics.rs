//! Client metrics
//!
//! Emitted through the `metrics` facade; without an installed recorder every
//! call is a no-op.
//!
//! - `api_client_requests_total` (counter): labels `method`, `status`
//! - `api_client_request_duration_seconds` (histogram): label `status`
//! - `api_client_refresh_total` (counter): label `result`
//! - `api_client_replays_total` (counter): label `status`
//! - `api_client_session_terminations_total` (counter): label `reason`

/// Name of the request latency histogram, for recorders that configure buckets.
pub const REQUEST_DURATION_METRIC: &str = "api_client_request_duration_seconds";

/// Record one network round trip (original request or replay).
pub fn record_request(method: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("api_client_requests_total", "method" => method.to_string(), "status" => status_str.clone())
        .increment(1);
    metrics::histogram!(REQUEST_DURATION_METRIC, "status" => status_str).record(duration_secs);
}

/// Record a refresh attempt: `success`, `rejected`, `network`, `unavailable`
/// or `coalesced`.
pub fn record_refresh(result: &'static str) {
    metrics::counter!("api_client_refresh_total", "result" => result).increment(1);
}

pub fn record_replay(status: u16) {
    metrics::counter!("api_client_replays_total", "status" => status.to_string()).increment(1);
}

pub fn record_termination(reason: &'static str) {
    metrics::counter!("api_client_session_terminations_total", "reason" => reason).increment(1);
}
