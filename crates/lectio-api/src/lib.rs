//! Axum HTTP gateway for metered video-transcript ingestion.
//!
//! This crate provides:
//! - Firebase ID token and App Check attestation verification
//! - Per-user sliding-window rate limiting and per-video abuse detection
//! - Cached cost previews and the transactional ingestion ledger
//! - Prometheus metrics

pub mod app_check;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod jwks;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
