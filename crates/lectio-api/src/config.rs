//! Gateway configuration.
//!
//! Domain limits are fixed constants, not runtime flags: every
//! deployment enforces the same admission-control policy. Only
//! deployment knobs (bind address, CORS, timeouts) come from the
//! environment.

use std::time::Duration;

// =============================================================================
// Fixed gateway limits
// =============================================================================

/// Preview requests allowed per user in any trailing minute.
pub const REQUESTS_PER_MINUTE: u32 = 10;

/// Preview requests allowed per user in any trailing hour.
pub const REQUESTS_PER_HOUR: u32 = 100;

/// Ingests allowed per user in any trailing hour.
pub const INGESTS_PER_HOUR: u32 = 10;

/// Minimum wait between two ingests by the same user.
pub const INGEST_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Requests for a single video id per day before it is blocked.
pub const RESOURCE_REQUESTS_PER_DAY: u32 = 60;

/// Session length; a session is a rolling burst-accounting window.
pub const SESSION_DURATION: Duration = Duration::from_secs(30 * 60);

/// Requests allowed within one session.
pub const SESSION_MAX_REQUESTS: u32 = 60;

/// Retention window for rate-limit timestamps.
pub const RETENTION_WINDOW: Duration = Duration::from_secs(3600);

/// Preview cache capacity (entries).
pub const PREVIEW_CACHE_CAPACITY: usize = 100;

/// Preview cache entry TTL.
pub const PREVIEW_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Maximum serialized request payload accepted by the validator.
pub const MAX_PAYLOAD_BYTES: usize = 1024;

// =============================================================================
// Deployment configuration
// =============================================================================

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Per-IP edge rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Request timeout
    pub request_timeout: Duration,
    /// Expected App Check application identity
    pub expected_app_id: String,
    /// Interval between maintenance sweeps
    pub sweep_interval: Duration,
    /// Environment (development/production)
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            request_timeout: Duration::from_secs(30),
            expected_app_id: String::new(),
            sweep_interval: Duration::from_secs(3600),
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            request_timeout: Duration::from_secs(
                std::env::var("REQUEST_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            expected_app_id: std::env::var("APP_CHECK_APP_ID").unwrap_or_default(),
            sweep_interval: Duration::from_secs(
                std::env::var("SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}
