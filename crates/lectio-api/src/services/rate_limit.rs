//! Per-user sliding-window rate limiting.
//!
//! State lives in process memory with no cross-instance sharing: two
//! requests landing on different instances can each see a fresh quota.
//! This is best-effort throttling by design; the only hard guarantee
//! in the gateway is the ledger commit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::{
    INGESTS_PER_HOUR, INGEST_COOLDOWN, REQUESTS_PER_HOUR, REQUESTS_PER_MINUTE, RETENTION_WINDOW,
    SESSION_DURATION, SESSION_MAX_REQUESTS,
};
use crate::error::{ApiError, ApiResult};

/// What kind of request is asking for admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Preview,
    Ingest,
}

/// Per-user limiter record.
#[derive(Debug, Default)]
struct UserRecord {
    /// Request timestamps within the retention window, oldest first.
    request_times: Vec<Instant>,
    /// Ingest timestamps within the retention window, oldest first.
    ingest_times: Vec<Instant>,
    session_start: Option<Instant>,
    session_count: u32,
}

impl UserRecord {
    fn purge(&mut self, now: Instant) {
        let cutoff = now.checked_sub(RETENTION_WINDOW);
        let keep = |t: &Instant| cutoff.map(|c| *t > c).unwrap_or(true);
        self.request_times.retain(keep);
        self.ingest_times.retain(keep);
    }

    fn session_expired(&self, now: Instant) -> bool {
        match self.session_start {
            Some(start) => now.duration_since(start) > SESSION_DURATION,
            None => true,
        }
    }

    fn count_within(times: &[Instant], now: Instant, window: Duration) -> u32 {
        match now.checked_sub(window) {
            Some(cutoff) => times.iter().filter(|t| **t > cutoff).count() as u32,
            None => times.len() as u32,
        }
    }

    fn is_empty(&self, now: Instant) -> bool {
        self.request_times.is_empty() && self.ingest_times.is_empty() && self.session_expired(now)
    }
}

/// Caller-visible snapshot of one user's windows, for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitStatus {
    pub requests_last_minute: u32,
    pub requests_last_hour: u32,
    pub ingests_last_hour: u32,
    pub session_requests: u32,
    pub limits: LimitCaps,
}

/// The fixed caps, echoed so clients need not hardcode them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitCaps {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub ingests_per_hour: u32,
    pub ingest_cooldown_seconds: u64,
    pub session_max_requests: u32,
}

impl Default for LimitCaps {
    fn default() -> Self {
        Self {
            requests_per_minute: REQUESTS_PER_MINUTE,
            requests_per_hour: REQUESTS_PER_HOUR,
            ingests_per_hour: INGESTS_PER_HOUR,
            ingest_cooldown_seconds: INGEST_COOLDOWN.as_secs(),
            session_max_requests: SESSION_MAX_REQUESTS,
        }
    }
}

/// Per-user sliding-window rate limiter.
#[derive(Clone, Default)]
pub struct RateLimiter {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or reject a request, recording it on success.
    pub async fn admit(&self, uid: &str, kind: RequestKind) -> ApiResult<()> {
        self.admit_at(uid, kind, Instant::now()).await
    }

    async fn admit_at(&self, uid: &str, kind: RequestKind, now: Instant) -> ApiResult<()> {
        let mut users = self.users.write().await;
        let record = users.entry(uid.to_string()).or_default();

        record.purge(now);

        // (a) session quota
        if record.session_expired(now) {
            record.session_start = Some(now);
            record.session_count = 0;
        } else if record.session_count >= SESSION_MAX_REQUESTS {
            metrics::counter!("gateway_rate_limit_hits_total", "limit" => "session").increment(1);
            return Err(ApiError::resource_exhausted(
                "Session limit exceeded. Please take a break and try again later.",
            ));
        }

        match kind {
            RequestKind::Ingest => {
                // (b) hourly ingest cap, then cooldown
                if UserRecord::count_within(&record.ingest_times, now, RETENTION_WINDOW)
                    >= INGESTS_PER_HOUR
                {
                    metrics::counter!("gateway_rate_limit_hits_total", "limit" => "ingest_hour")
                        .increment(1);
                    return Err(ApiError::resource_exhausted(format!(
                        "Hourly ingest limit of {} reached. Please try again later.",
                        INGESTS_PER_HOUR
                    )));
                }

                if let Some(last) = record.ingest_times.last() {
                    let since_last = now.duration_since(*last);
                    if since_last < INGEST_COOLDOWN {
                        let remaining = INGEST_COOLDOWN - since_last;
                        let minutes = remaining.as_secs().div_ceil(60).max(1);
                        metrics::counter!("gateway_rate_limit_hits_total", "limit" => "cooldown")
                            .increment(1);
                        return Err(ApiError::resource_exhausted(format!(
                            "Please wait {} more minute{} before adding another video.",
                            minutes,
                            if minutes == 1 { "" } else { "s" }
                        )));
                    }
                }
            }
            RequestKind::Preview => {
                // (c) trailing-minute and trailing-hour request caps
                if UserRecord::count_within(&record.request_times, now, Duration::from_secs(60))
                    >= REQUESTS_PER_MINUTE
                {
                    metrics::counter!("gateway_rate_limit_hits_total", "limit" => "minute")
                        .increment(1);
                    return Err(ApiError::resource_exhausted(
                        "Too many requests this minute. Please slow down.",
                    ));
                }
                if UserRecord::count_within(&record.request_times, now, RETENTION_WINDOW)
                    >= REQUESTS_PER_HOUR
                {
                    metrics::counter!("gateway_rate_limit_hits_total", "limit" => "hour")
                        .increment(1);
                    return Err(ApiError::resource_exhausted(
                        "Hourly request limit reached. Please try again later.",
                    ));
                }
            }
        }

        record.request_times.push(now);
        if kind == RequestKind::Ingest {
            record.ingest_times.push(now);
        }
        record.session_count += 1;

        Ok(())
    }

    /// Current window counts for one user.
    pub async fn status(&self, uid: &str) -> LimitStatus {
        let now = Instant::now();
        let users = self.users.read().await;
        let (minute, hour, ingests, session) = match users.get(uid) {
            Some(record) => (
                UserRecord::count_within(&record.request_times, now, Duration::from_secs(60)),
                UserRecord::count_within(&record.request_times, now, RETENTION_WINDOW),
                UserRecord::count_within(&record.ingest_times, now, RETENTION_WINDOW),
                if record.session_expired(now) { 0 } else { record.session_count },
            ),
            None => (0, 0, 0, 0),
        };

        LimitStatus {
            requests_last_minute: minute,
            requests_last_hour: hour,
            ingests_last_hour: ingests,
            session_requests: session,
            limits: LimitCaps::default(),
        }
    }

    /// Drop one user's record entirely (privileged reset).
    pub async fn reset_user(&self, uid: &str) -> bool {
        self.users.write().await.remove(uid).is_some()
    }

    /// Purge stale timestamps and sessions; drop empty records.
    /// Returns the number of user records removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut users = self.users.write().await;
        let before = users.len();

        for record in users.values_mut() {
            record.purge(now);
            if record.session_expired(now) {
                record.session_start = None;
                record.session_count = 0;
            }
        }
        users.retain(|_, record| !record.is_empty(now));

        before - users.len()
    }

    /// Number of tracked users.
    pub async fn tracked_users(&self) -> usize {
        self.users.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_preview_minute_cap() {
        let limiter = RateLimiter::new();
        for _ in 0..REQUESTS_PER_MINUTE {
            limiter.admit("u1", RequestKind::Preview).await.unwrap();
        }
        let err = limiter.admit("u1", RequestKind::Preview).await.unwrap_err();
        assert_eq!(err.kind(), "resource_exhausted");
    }

    #[tokio::test]
    async fn test_minute_cap_is_sliding() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for i in 0..REQUESTS_PER_MINUTE {
            limiter
                .admit_at("u1", RequestKind::Preview, start + Duration::from_secs(i as u64))
                .await
                .unwrap();
        }
        // 61 seconds after the first request, one slot has slid free
        limiter
            .admit_at("u1", RequestKind::Preview, start + Duration::from_secs(61))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ingest_cooldown_message_rounds_up() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        limiter.admit_at("u1", RequestKind::Ingest, start).await.unwrap();

        let err = limiter
            .admit_at("u1", RequestKind::Ingest, start + Duration::from_secs(90))
            .await
            .unwrap_err();
        // 210s remaining => 4 minutes rounded up
        assert!(err.to_string().contains("4 more minutes"), "{}", err);
    }

    #[tokio::test]
    async fn test_ingest_allowed_after_cooldown() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        limiter.admit_at("u1", RequestKind::Ingest, start).await.unwrap();
        limiter
            .admit_at("u1", RequestKind::Ingest, start + INGEST_COOLDOWN)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ingest_hourly_cap() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for i in 0..INGESTS_PER_HOUR {
            limiter
                .admit_at("u1", RequestKind::Ingest, start + INGEST_COOLDOWN * i)
                .await
                .unwrap();
        }
        let err = limiter
            .admit_at("u1", RequestKind::Ingest, start + INGEST_COOLDOWN * INGESTS_PER_HOUR)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Hourly ingest limit"));
    }

    #[tokio::test]
    async fn test_session_cap_and_renewal() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        // Ingests bypass the per-minute preview cap, so drive the
        // session counter with alternating timestamps inside one hour
        // but spread over the minute windows.
        let mut t = start;
        for _ in 0..SESSION_MAX_REQUESTS {
            limiter.admit_at("u1", RequestKind::Preview, t).await.unwrap();
            t += Duration::from_secs(20);
        }
        let err = limiter.admit_at("u1", RequestKind::Preview, t).await.unwrap_err();
        assert!(err.to_string().contains("Session limit"));

        // A new session starts after the session duration elapses
        let later = t + SESSION_DURATION + Duration::from_secs(1);
        limiter.admit_at("u1", RequestKind::Preview, later).await.unwrap();
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let limiter = RateLimiter::new();
        for _ in 0..REQUESTS_PER_MINUTE {
            limiter.admit("u1", RequestKind::Preview).await.unwrap();
        }
        limiter.admit("u2", RequestKind::Preview).await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_user_clears_record() {
        let limiter = RateLimiter::new();
        for _ in 0..REQUESTS_PER_MINUTE {
            limiter.admit("u1", RequestKind::Preview).await.unwrap();
        }
        assert!(limiter.reset_user("u1").await);
        limiter.admit("u1", RequestKind::Preview).await.unwrap();
        assert!(!limiter.reset_user("nobody").await);
    }

    #[tokio::test]
    async fn test_status_counts() {
        let limiter = RateLimiter::new();
        limiter.admit("u1", RequestKind::Preview).await.unwrap();
        limiter.admit("u1", RequestKind::Ingest).await.unwrap();

        let status = limiter.status("u1").await;
        assert_eq!(status.requests_last_minute, 2);
        assert_eq!(status.requests_last_hour, 2);
        assert_eq!(status.ingests_last_hour, 1);
        assert_eq!(status.session_requests, 2);

        let empty = limiter.status("nobody").await;
        assert_eq!(empty.requests_last_hour, 0);
    }

    #[tokio::test]
    async fn test_sweep_drops_idle_users() {
        let limiter = RateLimiter::new();
        limiter.admit("u1", RequestKind::Preview).await.unwrap();
        // Nothing stale yet, the active user survives
        assert_eq!(limiter.sweep().await, 0);
        assert_eq!(limiter.tracked_users().await, 1);
    }
}
