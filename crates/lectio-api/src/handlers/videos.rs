//! Preview and ingest handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use lectio_firestore::accounts::AccountRepository;
use lectio_models::account::PlanLimits;
use lectio_models::estimate::{estimate_cost, CostEstimate};

use crate::app_check::VerifiedApp;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::ingest::{current_month, IngestStatus};
use crate::services::rate_limit::RequestKind;
use crate::state::AppState;
use crate::validation::parse_video_request;

/// User-independent preview data, cacheable across users.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub duration_seconds: u32,
    pub captions_available: bool,
    /// Language of the first caption track, when any exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_language: Option<String>,
    pub caption_languages: Vec<String>,
    pub estimate: CostEstimate,
}

/// Full preview reply: the cached video part plus per-user plan info.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReply {
    #[serde(flatten)]
    pub video: PreviewResponse,
    pub plan: PlanLimits,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    pub cached: bool,
}

/// POST /api/videos/preview
///
/// Admission order: body validation, per-user windows, per-video abuse
/// check, then the cache. Plan limits are always computed fresh so a
/// cached video entry never leaks another user's plan.
pub async fn preview(
    State(state): State<AppState>,
    _app: VerifiedApp,
    user: AuthUser,
    body: Bytes,
) -> ApiResult<Json<PreviewReply>> {
    let req = parse_video_request(&body)?;

    state
        .rate_limiter
        .admit(&user.uid, RequestKind::Preview)
        .await?;
    state.abuse.check(&req.video_id).await?;

    let accounts = AccountRepository::new(state.firestore.clone());
    let snapshot = accounts
        .get(&user.uid)
        .await?
        .ok_or_else(|| ApiError::not_found("User account not found"))?;
    let plan = PlanLimits::for_account(&snapshot.account, &current_month());

    let (video, cached) = match state.preview_cache.get(&req.video_id).await {
        Some(hit) => (hit, true),
        None => {
            let meta = state.youtube.fetch_metadata(&req.video_id).await?;
            // Transcript length is unknown until ingest; estimate from duration
            let estimate = estimate_cost(meta.duration_seconds, None);
            let fresh = PreviewResponse {
                video_id: meta.video_id,
                title: meta.title,
                channel: meta.channel,
                thumbnail_url: meta.thumbnail_url,
                duration_seconds: meta.duration_seconds,
                captions_available: !meta.caption_languages.is_empty(),
                primary_language: meta.caption_languages.first().cloned(),
                caption_languages: meta.caption_languages,
                estimate,
            };
            state.preview_cache.insert(&req.video_id, fresh.clone()).await;
            (fresh, false)
        }
    };
    metrics::record_preview(if cached { "cache" } else { "fetch" });

    let (blocked, block_reason) = if !video.captions_available {
        (
            true,
            Some("No captions are available for this video.".to_string()),
        )
    } else if video.duration_seconds > plan.max_duration_seconds {
        (
            true,
            Some(format!(
                "Video is longer than the {} minute limit for your plan.",
                plan.max_duration_seconds / 60
            )),
        )
    } else {
        (false, None)
    };

    Ok(Json(PreviewReply {
        video,
        plan,
        blocked,
        block_reason,
        cached,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub material_id: String,
    pub status: IngestStatus,
    pub billed_units_charged: u32,
    pub input_tokens: u32,
}

/// POST /api/videos/ingest
pub async fn ingest(
    State(state): State<AppState>,
    _app: VerifiedApp,
    user: AuthUser,
    body: Bytes,
) -> ApiResult<Json<IngestResponse>> {
    let req = parse_video_request(&body)?;

    state
        .rate_limiter
        .admit(&user.uid, RequestKind::Ingest)
        .await?;
    state.abuse.check(&req.video_id).await?;

    let outcome = state
        .ingest
        .ingest(&user.uid, &req.video_id, req.preferred_language.as_deref())
        .await?;

    Ok(Json(IngestResponse {
        material_id: outcome.material_id,
        status: outcome.status,
        billed_units_charged: outcome.billed_units_charged,
        input_tokens: outcome.input_tokens,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_response_wire_shape() {
        let response = PreviewResponse {
            video_id: "dQw4w9WgXcQ".to_string(),
            title: "Lecture 1".to_string(),
            channel: "Prof".to_string(),
            thumbnail_url: None,
            duration_seconds: 600,
            captions_available: true,
            primary_language: Some("en".to_string()),
            caption_languages: vec!["en".to_string(), "de".to_string()],
            estimate: estimate_cost(600, Some(9000)),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["primaryLanguage"], "en");
        assert_eq!(json["captionsAvailable"], true);
        assert_eq!(json["captionLanguages"][1], "de");
        assert!(json.get("thumbnailUrl").is_none());
    }
}
