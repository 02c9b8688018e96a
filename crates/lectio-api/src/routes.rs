//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::MAX_PAYLOAD_BYTES;
use crate::handlers::admin::{cleanup, reset_limits};
use crate::handlers::health::{health, ready};
use crate::handlers::limits::status as limit_status;
use crate::handlers::videos::{ingest, preview};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, edge_rate_limit, request_id, request_logging, security_headers, EdgeLimiter,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let video_routes = Router::new()
        .route("/videos/preview", post(preview))
        .route("/videos/ingest", post(ingest));

    let limit_routes = Router::new().route("/limits/status", get(limit_status));

    let admin_routes = Router::new()
        .route("/admin/limits/reset", post(reset_limits))
        .route("/admin/cleanup", post(cleanup));

    // Per-IP flood control in front of every API route
    let edge_limiter = std::sync::Arc::new(EdgeLimiter::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(video_routes)
        .merge(limit_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(
            edge_limiter,
            edge_rate_limit,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(MAX_PAYLOAD_BYTES * 4))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
