//! Transactional ingestion ledger.
//!
//! Debiting the token balance and creating the material record happen
//! in one Firestore commit. The account write carries an updateTime
//! precondition and the material write an exists:false precondition,
//! so a concurrent debit retries and a concurrent create resolves as
//! already_exists. At most one commit ever succeeds per (user, video).

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use lectio_firestore::accounts::{AccountRepository, AccountSnapshot};
use lectio_firestore::materials::MaterialRepository;
use lectio_firestore::FirestoreClient;
use lectio_models::estimate::{estimate_cost, CostEstimate};
use lectio_models::material::Material;
use lectio_models::transcript::sanitize_transcript;
use lectio_storage::transcript_blob::{store_transcript, TranscriptBlobMeta};
use lectio_storage::R2Client;

use crate::error::{ApiError, ApiResult};
use crate::services::youtube::YouTubeClient;

/// Commit attempts before giving up on precondition contention.
const MAX_COMMIT_RETRIES: u32 = 5;
const COMMIT_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Processed,
    AlreadyExists,
}

/// Result of one ingest call.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub material_id: String,
    pub status: IngestStatus,
    pub billed_units_charged: u32,
    pub input_tokens: u32,
}

/// Orchestrates fetch, estimate, blob store and the ledger commit.
pub struct IngestService {
    firestore: FirestoreClient,
    storage: R2Client,
    youtube: Arc<YouTubeClient>,
}

impl IngestService {
    pub fn new(firestore: FirestoreClient, storage: R2Client, youtube: Arc<YouTubeClient>) -> Self {
        Self {
            firestore,
            storage,
            youtube,
        }
    }

    /// Ingest a video for a user, exactly once.
    pub async fn ingest(
        &self,
        uid: &str,
        video_id: &str,
        preferred_language: Option<&str>,
    ) -> ApiResult<IngestOutcome> {
        let accounts = AccountRepository::new(self.firestore.clone());
        let materials = MaterialRepository::new(self.firestore.clone(), uid);

        // Fast idempotency path before any external fetches
        if let Some(existing) = materials.get(video_id).await? {
            info!(uid, video_id, "material already exists, skipping ingest");
            return Ok(already_exists_outcome(existing));
        }

        let month_key = current_month();
        let snapshot = self.load_account(&accounts, uid).await?;

        if !snapshot.account.within_monthly_quota(&month_key) {
            return Err(ApiError::resource_exhausted(format!(
                "Monthly limit of {} materials reached for your plan.",
                snapshot.account.tier.monthly_material_quota()
            )));
        }

        let metadata = self.youtube.fetch_metadata(video_id).await?;
        let max_duration = snapshot.account.tier.max_video_duration_secs();
        if metadata.duration_seconds > max_duration {
            return Err(ApiError::failed_precondition(format!(
                "Video is longer than the {} minute limit for your plan.",
                max_duration / 60
            )));
        }

        let transcript = self
            .youtube
            .fetch_transcript(video_id, preferred_language)
            .await?
            .ok_or_else(|| {
                ApiError::failed_precondition("No transcript is available for this video.")
            })?;

        let text = sanitize_transcript(&transcript.text);
        let char_count = text.chars().count() as u32;
        let estimate = estimate_cost(metadata.duration_seconds, Some(char_count));

        // Cheap pre-check; the commit loop re-verifies against a fresh read
        if snapshot.account.token_balance < i64::from(estimate.billed_units) {
            return Err(insufficient_tokens(&estimate, snapshot.account.token_balance));
        }

        // The blob goes up before the commit. A failed commit leaves an
        // orphan object that a later successful ingest overwrites.
        let blob_meta = TranscriptBlobMeta {
            video_id: video_id.to_string(),
            language: transcript.language.clone(),
            char_count,
        };
        store_transcript(&self.storage, uid, &text, &blob_meta)
            .await
            .map_err(|e| ApiError::internal(format!("transcript upload failed: {}", e)))?;

        let material = Material::new_video_transcript(
            uid,
            video_id,
            &metadata.title,
            metadata.duration_seconds,
            char_count,
            estimate.input_tokens,
            estimate.billed_units,
            &transcript.language,
        );

        self.commit_ledger(&accounts, &materials, uid, &month_key, &estimate, &material)
            .await
    }

    async fn load_account(
        &self,
        accounts: &AccountRepository,
        uid: &str,
    ) -> ApiResult<AccountSnapshot> {
        accounts
            .get(uid)
            .await?
            .ok_or_else(|| ApiError::not_found("User account not found"))
    }

    /// Commit the debit and the material create atomically, retrying
    /// on updateTime contention.
    async fn commit_ledger(
        &self,
        accounts: &AccountRepository,
        materials: &MaterialRepository,
        uid: &str,
        month_key: &str,
        estimate: &CostEstimate,
        material: &Material,
    ) -> ApiResult<IngestOutcome> {
        for attempt in 1..=MAX_COMMIT_RETRIES {
            // A commit that lost the exists:false race resolves here
            if let Some(existing) = materials.get(&material.material_id).await? {
                info!(uid, video_id = %material.material_id, "concurrent ingest won the race");
                return Ok(already_exists_outcome(existing));
            }

            let snapshot = self.load_account(accounts, uid).await?;
            let cost = i64::from(estimate.billed_units);
            if snapshot.account.token_balance < cost {
                return Err(insufficient_tokens(estimate, snapshot.account.token_balance));
            }

            let new_balance = snapshot.account.token_balance - cost;
            let new_materials = snapshot.account.effective_materials_this_month(month_key) + 1;

            let writes = vec![
                accounts.debit_write(&snapshot, new_balance, new_materials, month_key),
                materials.create_write(material),
            ];

            match self.firestore.commit(writes).await {
                Ok(_) => {
                    info!(
                        uid,
                        video_id = %material.material_id,
                        billed_units = estimate.billed_units,
                        new_balance,
                        "ledger commit succeeded"
                    );
                    metrics::counter!("gateway_ingests_total", "status" => "processed")
                        .increment(1);
                    metrics::counter!("gateway_tokens_debited_total")
                        .increment(u64::from(estimate.billed_units));
                    return Ok(IngestOutcome {
                        material_id: material.material_id.clone(),
                        status: IngestStatus::Processed,
                        billed_units_charged: estimate.billed_units,
                        input_tokens: estimate.input_tokens,
                    });
                }
                Err(e) if e.is_already_exists() => {
                    // The material create lost; next loop iteration
                    // returns the winner's record
                    continue;
                }
                Err(e) if e.is_precondition_failed() && attempt < MAX_COMMIT_RETRIES => {
                    warn!(
                        uid,
                        attempt,
                        "ledger commit hit concurrent account update, retrying"
                    );
                    tokio::time::sleep(COMMIT_RETRY_DELAY * attempt).await;
                    continue;
                }
                Err(e) => {
                    return Err(ApiError::internal(format!("ledger commit failed: {}", e)));
                }
            }
        }

        Err(ApiError::internal(
            "ledger commit failed after repeated concurrent updates",
        ))
    }
}

fn already_exists_outcome(existing: Material) -> IngestOutcome {
    metrics::counter!("gateway_ingests_total", "status" => "already_exists").increment(1);
    IngestOutcome {
        material_id: existing.material_id,
        status: IngestStatus::AlreadyExists,
        billed_units_charged: 0,
        input_tokens: existing.input_tokens,
    }
}

fn insufficient_tokens(estimate: &CostEstimate, balance: i64) -> ApiError {
    ApiError::resource_exhausted(format!(
        "Insufficient tokens: this video costs {} units but your balance is {}.",
        estimate.billed_units, balance
    ))
}

/// Month key in `YYYY-MM` form, used for the monthly quota rollover.
pub fn current_month() -> String {
    chrono::Utc::now().format("%Y-%m").to_string()
}
