//! Admin handlers: per-user limit resets and on-demand cleanup.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use lectio_firestore::accounts::AccountRepository;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::services::sweeper::SweepReport;
use crate::state::AppState;

/// The `is_admin` flag on the caller's account gates these routes.
async fn require_admin(state: &AppState, uid: &str) -> ApiResult<()> {
    let accounts = AccountRepository::new(state.firestore.clone());
    let snapshot = accounts
        .get(uid)
        .await?
        .ok_or_else(|| ApiError::not_found("User account not found"))?;

    if !snapshot.account.is_admin {
        return Err(ApiError::permission_denied("Admin access required"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetLimitsRequest {
    pub target_uid: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetLimitsResponse {
    pub target_uid: String,
    pub had_record: bool,
}

/// POST /api/admin/limits/reset
///
/// Drops one user's rate-limit windows. Abuse counters are untouched;
/// those reset only in bulk at the daily rollover.
pub async fn reset_limits(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ResetLimitsRequest>,
) -> ApiResult<Json<ResetLimitsResponse>> {
    require_admin(&state, &user.uid).await?;

    if request.target_uid.trim().is_empty() {
        return Err(ApiError::invalid_argument("targetUid is required"));
    }

    let had_record = state.rate_limiter.reset_user(&request.target_uid).await;
    info!(admin = %user.uid, target = %request.target_uid, had_record, "rate limits reset");

    Ok(Json(ResetLimitsResponse {
        target_uid: request.target_uid,
        had_record,
    }))
}

/// POST /api/admin/cleanup
///
/// Full reset of all soft admission-control state: stale rate-limit
/// windows purged, preview cache emptied, abuse counters and block set
/// cleared. Heavier than the background sweep, which only drops what
/// has expired.
pub async fn cleanup(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<SweepReport>> {
    require_admin(&state, &user.uid).await?;

    let report = state.sweeper.full_sweep().await;
    info!(admin = %user.uid, ?report, "manual cleanup sweep");

    Ok(Json(report))
}
