//! Background maintenance sweeper.
//!
//! Runs on an interval: purges stale rate-limit windows, drops expired
//! preview cache entries, and resets the per-video abuse counters when
//! the UTC date rolls over. The admin cleanup endpoint instead performs
//! a full reset of all soft state via [`MaintenanceSweeper::full_sweep`].

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::services::abuse::AbuseDetector;
use crate::services::preview_cache::PreviewCache;
use crate::services::rate_limit::RateLimiter;

/// What one sweep removed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub limiter_users_removed: usize,
    pub cache_entries_before: usize,
    pub cache_entries_after: usize,
    pub videos_unblocked: usize,
}

pub struct MaintenanceSweeper<T: Clone> {
    rate_limiter: RateLimiter,
    abuse: AbuseDetector,
    preview_cache: PreviewCache<T>,
    interval: Duration,
    last_abuse_reset: Mutex<NaiveDate>,
}

impl<T: Clone + Send + Sync + 'static> MaintenanceSweeper<T> {
    pub fn new(
        rate_limiter: RateLimiter,
        abuse: AbuseDetector,
        preview_cache: PreviewCache<T>,
        interval: Duration,
    ) -> Self {
        Self {
            rate_limiter,
            abuse,
            preview_cache,
            interval,
            last_abuse_reset: Mutex::new(Utc::now().date_naive()),
        }
    }

    /// Run the sweep loop forever. Spawned at startup.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_secs = self.interval.as_secs(), "maintenance sweeper started");

        loop {
            ticker.tick().await;
            let report = self.sweep_once().await;
            debug!(
                limiter_users_removed = report.limiter_users_removed,
                cache_entries_after = report.cache_entries_after,
                "maintenance sweep complete"
            );
        }
    }

    /// One full sweep pass.
    pub async fn sweep_once(&self) -> SweepReport {
        let cache_entries_before = self.preview_cache.len().await;
        self.preview_cache.sweep().await;
        let cache_entries_after = self.preview_cache.len().await;

        let limiter_users_removed = self.rate_limiter.sweep().await;

        // Abuse counters reset once per UTC day, not per sweep
        let today = Utc::now().date_naive();
        let mut last = self.last_abuse_reset.lock().await;
        let videos_unblocked = if *last != today {
            *last = today;
            let released = self.abuse.reset_daily().await;
            if released > 0 {
                info!(released, "daily abuse reset released blocked videos");
            }
            released
        } else {
            0
        };

        SweepReport {
            limiter_users_removed,
            cache_entries_before,
            cache_entries_after,
            videos_unblocked,
        }
    }

    /// Full reset of all soft state: every rate-limit record, the whole
    /// preview cache, and the abuse counters and block set. Used by the
    /// admin cleanup endpoint; the interval loop only runs [`Self::sweep_once`].
    pub async fn full_sweep(&self) -> SweepReport {
        let cache_entries_before = self.preview_cache.len().await;
        self.preview_cache.clear().await;

        let limiter_users_removed = self.rate_limiter.sweep().await;

        let videos_unblocked = self.abuse.reset_daily().await;
        *self.last_abuse_reset.lock().await = Utc::now().date_naive();

        SweepReport {
            limiter_users_removed,
            cache_entries_before,
            cache_entries_after: 0,
            videos_unblocked,
        }
    }
}
