//! Application state.

use std::sync::Arc;

use lectio_firestore::FirestoreClient;
use lectio_storage::R2Client;

use crate::app_check::AppCheckVerifier;
use crate::auth::AuthVerifier;
use crate::config::ApiConfig;
use crate::handlers::videos::PreviewResponse;
use crate::services::abuse::AbuseDetector;
use crate::services::ingest::IngestService;
use crate::services::preview_cache::PreviewCache;
use crate::services::rate_limit::RateLimiter;
use crate::services::sweeper::MaintenanceSweeper;
use crate::services::youtube::YouTubeClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub firestore: FirestoreClient,
    pub storage: R2Client,
    pub youtube: Arc<YouTubeClient>,
    pub auth: Arc<AuthVerifier>,
    pub app_check: Arc<AppCheckVerifier>,
    pub rate_limiter: RateLimiter,
    pub abuse: AbuseDetector,
    pub preview_cache: PreviewCache<PreviewResponse>,
    pub ingest: Arc<IngestService>,
    pub sweeper: Arc<MaintenanceSweeper<PreviewResponse>>,
}

impl AppState {
    /// Build the full state from configuration and environment.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let firestore = FirestoreClient::from_env().await?;
        let storage = R2Client::from_env().await?;
        let youtube = Arc::new(YouTubeClient::new()?);

        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))?;
        let auth = Arc::new(AuthVerifier::new(project_id)?);
        let app_check = Arc::new(AppCheckVerifier::new(&config.expected_app_id)?);

        let ingest = Arc::new(IngestService::new(
            firestore.clone(),
            storage.clone(),
            Arc::clone(&youtube),
        ));

        let rate_limiter = RateLimiter::new();
        let abuse = AbuseDetector::new();
        let preview_cache = PreviewCache::default();
        let sweeper = Arc::new(MaintenanceSweeper::new(
            rate_limiter.clone(),
            abuse.clone(),
            preview_cache.clone(),
            config.sweep_interval,
        ));

        Ok(Self {
            config,
            firestore,
            storage,
            youtube,
            auth,
            app_check,
            rate_limiter,
            abuse,
            preview_cache,
            ingest,
            sweeper,
        })
    }
}
