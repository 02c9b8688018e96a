//! Rate-limit status handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::services::rate_limit::LimitStatus;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitStatusResponse {
    pub uid: String,
    #[serde(flatten)]
    pub status: LimitStatus,
}

/// GET /api/limits/status
///
/// Reports the caller's current window counts and the fixed caps.
pub async fn status(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<LimitStatusResponse>> {
    let status = state.rate_limiter.status(&user.uid).await;

    Ok(Json(LimitStatusResponse {
        uid: user.uid,
        status,
    }))
}
