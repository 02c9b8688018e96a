//! Firestore REST API client.
//!
//! Thin client over the Firestore v1 REST surface with token caching,
//! bounded retry, and the atomic `commit` endpoint the ingestion
//! ledger depends on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, Method, StatusCode};
use tracing::debug;

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::token_cache::TokenCache;
use crate::types::{CommitRequest, CommitResponse, Document, Write};

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error("GCP_PROJECT_ID cannot be empty"));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }
}

enum TokenSource {
    Gcp(Arc<TokenCache>),
    /// Fixed token, for the emulator and for wiremock tests.
    Static(String),
}

impl TokenSource {
    async fn token(&self) -> FirestoreResult<String> {
        match self {
            TokenSource::Gcp(cache) => cache.get_token().await,
            TokenSource::Static(token) => Ok(token.clone()),
        }
    }

    async fn invalidate(&self) {
        if let TokenSource::Gcp(cache) = self {
            cache.invalidate().await;
        }
    }
}

/// Firestore REST API client.
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    /// `https://{host}/v1/projects/{p}/databases/{d}/documents`
    documents_url: String,
    token_source: Arc<TokenSource>,
}

impl Clone for FirestoreClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            documents_url: self.documents_url.clone(),
            token_source: Arc::clone(&self.token_source),
        }
    }
}

impl FirestoreClient {
    /// Create a new client against the production endpoint.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let service_account = CustomServiceAccount::from_env()
            .map_err(|e| FirestoreError::auth_error(format!("Failed to load service account: {}", e)))?
            .ok_or_else(|| {
                FirestoreError::auth_error(
                    "GOOGLE_APPLICATION_CREDENTIALS not set. \
                     Set it to the path of your service account JSON file.",
                )
            })?;
        let auth: Arc<dyn TokenProvider> = Arc::new(service_account);

        let token_source = TokenSource::Gcp(Arc::new(TokenCache::new(auth)));
        Self::build("https://firestore.googleapis.com", config, token_source)
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        Self::new(FirestoreConfig::from_env()?).await
    }

    /// Create a client against an arbitrary host with a fixed bearer
    /// token. Used for the Firestore emulator and in tests.
    pub fn with_endpoint(
        host: impl Into<String>,
        config: FirestoreConfig,
        token: impl Into<String>,
    ) -> FirestoreResult<Self> {
        Self::build(&host.into(), config, TokenSource::Static(token.into()))
    }

    fn build(host: &str, config: FirestoreConfig, token_source: TokenSource) -> FirestoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("lectio-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let documents_url = format!(
            "{}/v1/projects/{}/databases/{}/documents",
            host.trim_end_matches('/'),
            config.project_id,
            config.database_id
        );

        Ok(Self { http, config, documents_url, token_source: Arc::new(token_source) })
    }

    /// Full resource name for a document path like `users/u1/materials/abc`.
    pub fn document_name(&self, path: &str) -> String {
        format!(
            "projects/{}/databases/{}/documents/{}",
            self.config.project_id, self.config.database_id, path
        )
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    /// Send one request with bearer auth, re-fetching the token once if
    /// the server reports it expired.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> FirestoreResult<(StatusCode, String)> {
        let build = |token: &str| {
            let mut req = self.http.request(method.clone(), url).bearer_auth(token);
            if let Some(json) = body {
                req = req.json(json);
            }
            req
        };

        let mut token = self.token_source.token().await?;
        let mut response = build(&token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let text = response.text().await.unwrap_or_default();
            if !Self::is_access_token_expired(&text) {
                return Ok((StatusCode::UNAUTHORIZED, text));
            }
            self.token_source.invalidate().await;
            token = self.token_source.token().await?;
            response = build(&token).send().await?;
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Ok((status, text))
    }

    /// Get a document by path (e.g. `users/u1`). `Ok(None)` when absent.
    pub async fn get_document(&self, path: &str) -> FirestoreResult<Option<Document>> {
        let url = format!("{}/{}", self.documents_url, path);
        let start = Instant::now();

        let result = with_retry(&self.config.retry, "get_document", || async {
            let (status, body) = self.send(Method::GET, &url, None).await?;
            match status {
                StatusCode::OK => {
                    let doc: Document = serde_json::from_str(&body)?;
                    Ok(Some(doc))
                }
                StatusCode::NOT_FOUND => Ok(None),
                _ => Err(FirestoreError::from_http_status(status.as_u16(), body)),
            }
        })
        .await;

        record_request("get_document", result.is_ok(), start.elapsed());
        debug!(path, found = matches!(result, Ok(Some(_))), "firestore get");
        result
    }

    /// Atomically apply a set of writes: either every write (and its
    /// precondition) succeeds, or nothing is applied.
    ///
    /// Not retried internally: a failed precondition means the caller
    /// must re-read and rebuild the writes.
    pub async fn commit(&self, writes: Vec<Write>) -> FirestoreResult<CommitResponse> {
        let url = format!("{}:commit", self.documents_url);
        let body = serde_json::to_value(CommitRequest { writes })?;
        let start = Instant::now();

        let result = async {
            let (status, text) = self.send(Method::POST, &url, Some(&body)).await?;
            match status {
                StatusCode::OK => {
                    let response: CommitResponse = serde_json::from_str(&text)?;
                    Ok(response)
                }
                _ => Err(FirestoreError::from_http_status(status.as_u16(), text)),
            }
        }
        .await;

        record_request("commit", result.is_ok(), start.elapsed());
        result
    }
}
