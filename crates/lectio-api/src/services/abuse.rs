//! Per-video abuse detection.
//!
//! Counts requests per video across all users and blocks videos that
//! attract too much traffic in one day. Counters and the block set are
//! only cleared together by the daily reset; the periodic sweeper does
//! not touch them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::config::RESOURCE_REQUESTS_PER_DAY;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Default)]
struct AbuseState {
    daily_counts: HashMap<String, u32>,
    blocked: HashSet<String>,
}

/// Tracks per-video request volume and blocks hot videos.
#[derive(Clone, Default)]
pub struct AbuseDetector {
    state: Arc<RwLock<AbuseState>>,
}

impl AbuseDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request against a video, rejecting if it is blocked
    /// or crosses the daily threshold with this request.
    pub async fn check(&self, video_id: &str) -> ApiResult<()> {
        let mut state = self.state.write().await;

        if state.blocked.contains(video_id) {
            return Err(ApiError::permission_denied(
                "This video is temporarily unavailable due to unusual activity.",
            ));
        }

        let count = {
            let entry = state.daily_counts.entry(video_id.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        if count >= RESOURCE_REQUESTS_PER_DAY {
            warn!(video_id, count, "video crossed daily request threshold, blocking");
            metrics::counter!("gateway_videos_blocked_total").increment(1);
            state.blocked.insert(video_id.to_string());
            return Err(ApiError::permission_denied(
                "This video is temporarily unavailable due to unusual activity.",
            ));
        }

        Ok(())
    }

    pub async fn is_blocked(&self, video_id: &str) -> bool {
        self.state.read().await.blocked.contains(video_id)
    }

    /// Daily reset: counters and block set clear together.
    pub async fn reset_daily(&self) -> usize {
        let mut state = self.state.write().await;
        let released = state.blocked.len();
        state.daily_counts.clear();
        state.blocked.clear();
        released
    }

    pub async fn tracked_videos(&self) -> usize {
        self.state.read().await.daily_counts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blocks_at_threshold() {
        let detector = AbuseDetector::new();
        for _ in 0..RESOURCE_REQUESTS_PER_DAY - 1 {
            detector.check("vid").await.unwrap();
        }
        assert!(!detector.is_blocked("vid").await);

        let err = detector.check("vid").await.unwrap_err();
        assert_eq!(err.kind(), "permission_denied");
        assert!(detector.is_blocked("vid").await);
    }

    #[tokio::test]
    async fn test_blocked_video_stays_blocked() {
        let detector = AbuseDetector::new();
        for _ in 0..RESOURCE_REQUESTS_PER_DAY {
            let _ = detector.check("vid").await;
        }
        assert!(detector.check("vid").await.is_err());
        assert!(detector.check("vid").await.is_err());
    }

    #[tokio::test]
    async fn test_videos_counted_independently() {
        let detector = AbuseDetector::new();
        for _ in 0..RESOURCE_REQUESTS_PER_DAY - 1 {
            detector.check("hot").await.unwrap();
        }
        detector.check("cold").await.unwrap();
        assert!(!detector.is_blocked("cold").await);
    }

    #[tokio::test]
    async fn test_daily_reset_releases_blocks() {
        let detector = AbuseDetector::new();
        for _ in 0..RESOURCE_REQUESTS_PER_DAY {
            let _ = detector.check("vid").await;
        }
        assert!(detector.is_blocked("vid").await);

        assert_eq!(detector.reset_daily().await, 1);
        assert!(!detector.is_blocked("vid").await);
        detector.check("vid").await.unwrap();
    }
}
