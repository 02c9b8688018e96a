//! Retry policy with exponential backoff and jitter.

use std::time::Duration;

use tracing::warn;

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_retry;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 100, max_delay_ms: 5000 }
    }
}

impl RetryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let parse = |name: &str, default: u64| {
            std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
        };
        Self {
            max_retries: 3,
            base_delay_ms: parse("FIRESTORE_RETRY_BASE_MS", 100),
            max_delay_ms: parse("FIRESTORE_RETRY_MAX_MS", 5000),
        }
    }
}

/// Execute an async operation, retrying transient failures.
///
/// Retries network errors, throttling (honoring the suggested delay),
/// and 5xx responses. Everything else surfaces immediately.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &'static str,
    op: F,
) -> FirestoreResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = FirestoreResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = backoff_delay(config, attempt, e.retry_after_ms());
                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Firestore request failed, retrying: {}", e
                );
                record_retry(operation);
                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| FirestoreError::request_failed("retry budget exhausted")))
}

/// Exponential backoff with full jitter, capped at `max_delay_ms`.
fn backoff_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    if let Some(after) = retry_after_ms {
        return Duration::from_millis(after);
    }

    let exp = config.base_delay_ms.saturating_mul(2u64.pow(attempt));
    let capped = exp.min(config.max_delay_ms);

    // Time-based pseudo-randomization keeps the rand crate out of the tree
    let jittered = if capped > 0 {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let factor = (nanos % 1000) as f64 / 1000.0;
        ((capped as f64) * factor) as u64
    } else {
        0
    };

    Duration::from_millis(jittered.max(config.base_delay_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_honors_retry_after() {
        let config = RetryConfig::default();
        assert_eq!(backoff_delay(&config, 0, Some(2500)), Duration::from_millis(2500));
    }

    #[test]
    fn test_delay_capped_and_bounded_below() {
        let config = RetryConfig { max_retries: 3, base_delay_ms: 100, max_delay_ms: 2000 };
        let delay = backoff_delay(&config, 12, None);
        assert!(delay >= Duration::from_millis(100));
        assert!(delay <= Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let config = RetryConfig::default();
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: FirestoreResult<()> = with_retry(&config, "test", || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err(FirestoreError::not_found("x")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
