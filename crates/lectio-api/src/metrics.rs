//! Prometheus metrics for the gateway.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use regex::Regex;

/// Install the Prometheus recorder. Called once at startup.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "gateway_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "gateway_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "gateway_http_requests_in_flight";

    pub const PREVIEWS_TOTAL: &str = "gateway_previews_total";
    pub const PREVIEW_CACHE_TOTAL: &str = "gateway_preview_cache_total";
    pub const INGESTS_TOTAL: &str = "gateway_ingests_total";
    pub const TOKENS_DEBITED_TOTAL: &str = "gateway_tokens_debited_total";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "gateway_rate_limit_hits_total";
    pub const VIDEOS_BLOCKED_TOTAL: &str = "gateway_videos_blocked_total";
    pub const IP_RATE_LIMIT_HITS_TOTAL: &str = "gateway_ip_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a preview served, labelled by where the answer came from.
pub fn record_preview(source: &'static str) {
    counter!(names::PREVIEWS_TOTAL, "source" => source).increment(1);
}

/// Record an edge (per-IP) rate limit rejection.
pub fn record_ip_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::IP_RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static VIDEO_ID_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/videos/[A-Za-z0-9_-]{11}").unwrap());
static USER_ID_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/users/[A-Za-z0-9_-]+").unwrap());

/// Collapse identifiers out of paths so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let path = VIDEO_ID_SEGMENT.replace_all(path, "/videos/:video_id");
    let path = USER_ID_SEGMENT.replace_all(&path, "/users/:uid");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_collapses_ids() {
        assert_eq!(
            sanitize_path("/api/videos/dQw4w9WgXcQ"),
            "/api/videos/:video_id"
        );
        assert_eq!(sanitize_path("/users/abc123/limits"), "/users/:uid/limits");
        assert_eq!(sanitize_path("/api/videos/preview"), "/api/videos/preview");
    }
}
