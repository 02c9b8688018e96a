//! Plan configuration and user account document shape.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Monthly video-ingest quotas for each plan tier.
pub const FREE_MONTHLY_MATERIALS: u32 = 10;
pub const STUDENT_MONTHLY_MATERIALS: u32 = 100;
pub const SCHOLAR_MONTHLY_MATERIALS: u32 = 500;

/// Plan tier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Student,
    Scholar,
}

impl PlanTier {
    /// Parse from string (case-insensitive). Unknown tiers fall back to Free.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "student" => PlanTier::Student,
            "scholar" => PlanTier::Scholar,
            _ => PlanTier::Free,
        }
    }

    /// Get the plan name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Student => "student",
            PlanTier::Scholar => "scholar",
        }
    }

    /// Monthly video-ingest quota for this tier.
    pub fn monthly_material_quota(&self) -> u32 {
        match self {
            PlanTier::Free => FREE_MONTHLY_MATERIALS,
            PlanTier::Student => STUDENT_MONTHLY_MATERIALS,
            PlanTier::Scholar => SCHOLAR_MONTHLY_MATERIALS,
        }
    }

    /// Longest video this tier is allowed to ingest, in seconds.
    pub fn max_video_duration_secs(&self) -> u32 {
        match self {
            PlanTier::Free => 30 * 60,
            PlanTier::Student => 2 * 60 * 60,
            PlanTier::Scholar => 4 * 60 * 60,
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plan limits reported back to clients in preview responses.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanLimits {
    /// Plan identifier.
    pub tier: String,
    /// Maximum video duration in seconds.
    pub max_duration_seconds: u32,
    /// Monthly material quota.
    pub monthly_quota: u32,
    /// Materials remaining this month.
    pub monthly_remaining: u32,
}

impl PlanLimits {
    /// Build the limits block for an account, honoring the monthly reset key.
    pub fn for_account(account: &UserAccount, current_month: &str) -> Self {
        let quota = account.tier.monthly_material_quota();
        let used = account.effective_materials_this_month(current_month);
        Self {
            tier: account.tier.as_str().to_string(),
            max_duration_seconds: account.tier.max_video_duration_secs(),
            monthly_quota: quota,
            monthly_remaining: quota.saturating_sub(used),
        }
    }
}

/// User account document as stored in Firestore.
///
/// Owned by the account subsystem; the ingestion gateway reads it and
/// conditionally decrements `token_balance` inside the ledger commit.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserAccount {
    /// User id (document id).
    pub uid: String,
    /// Plan tier.
    pub tier: PlanTier,
    /// ML token balance. Never driven below zero by the ledger.
    pub token_balance: i64,
    /// Materials created in the current usage month.
    pub materials_this_month: u32,
    /// "YYYY-MM" key the monthly counter belongs to. A mismatch with
    /// the current month means the counter is stale and reads as zero.
    pub usage_reset_month: Option<String>,
    /// Administrative flag; gates the privileged operations.
    pub is_admin: bool,
    /// Last write time, if known.
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// Materials created this month, honoring the reset-month key.
    pub fn effective_materials_this_month(&self, current_month: &str) -> u32 {
        if self.usage_reset_month.as_deref() == Some(current_month) {
            self.materials_this_month
        } else {
            0
        }
    }

    /// Whether the account may create another material this month.
    pub fn within_monthly_quota(&self, current_month: &str) -> bool {
        self.effective_materials_this_month(current_month) < self.tier.monthly_material_quota()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(tier: PlanTier, used: u32, month: Option<&str>) -> UserAccount {
        UserAccount {
            uid: "u1".to_string(),
            tier,
            token_balance: 100,
            materials_this_month: used,
            usage_reset_month: month.map(|m| m.to_string()),
            is_admin: false,
            updated_at: None,
        }
    }

    #[test]
    fn test_tier_from_string() {
        assert_eq!(PlanTier::from_str("free"), PlanTier::Free);
        assert_eq!(PlanTier::from_str("Student"), PlanTier::Student);
        assert_eq!(PlanTier::from_str("SCHOLAR"), PlanTier::Scholar);
        assert_eq!(PlanTier::from_str("unknown"), PlanTier::Free);
    }

    #[test]
    fn test_monthly_quota_per_tier() {
        assert_eq!(PlanTier::Free.monthly_material_quota(), FREE_MONTHLY_MATERIALS);
        assert_eq!(PlanTier::Student.monthly_material_quota(), STUDENT_MONTHLY_MATERIALS);
        assert_eq!(PlanTier::Scholar.monthly_material_quota(), SCHOLAR_MONTHLY_MATERIALS);
    }

    #[test]
    fn test_effective_usage_resets_on_month_change() {
        let acct = account(PlanTier::Free, 9, Some("2025-01"));
        assert_eq!(acct.effective_materials_this_month("2025-01"), 9);
        assert_eq!(acct.effective_materials_this_month("2025-02"), 0);
    }

    #[test]
    fn test_within_monthly_quota_boundary() {
        let at_limit = account(PlanTier::Free, FREE_MONTHLY_MATERIALS, Some("2025-01"));
        assert!(!at_limit.within_monthly_quota("2025-01"));
        // New month: counter is stale, quota is available again
        assert!(at_limit.within_monthly_quota("2025-02"));

        let under = account(PlanTier::Free, FREE_MONTHLY_MATERIALS - 1, Some("2025-01"));
        assert!(under.within_monthly_quota("2025-01"));
    }

    #[test]
    fn test_plan_limits_remaining() {
        let acct = account(PlanTier::Student, 40, Some("2025-01"));
        let limits = PlanLimits::for_account(&acct, "2025-01");
        assert_eq!(limits.monthly_quota, STUDENT_MONTHLY_MATERIALS);
        assert_eq!(limits.monthly_remaining, STUDENT_MONTHLY_MATERIALS - 40);
        assert_eq!(limits.tier, "student");
    }
}
