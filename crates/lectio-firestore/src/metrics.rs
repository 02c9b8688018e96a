//! Firestore client metrics.

use std::time::Duration;

use metrics::{counter, histogram};

/// Record one Firestore request outcome.
pub fn record_request(operation: &'static str, ok: bool, elapsed: Duration) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("firestore_requests_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    histogram!("firestore_request_duration_seconds", "operation" => operation)
        .record(elapsed.as_secs_f64());
}

/// Record one retry of a Firestore request.
pub fn record_retry(operation: &'static str) {
    counter!("firestore_retries_total", "operation" => operation).increment(1);
}
