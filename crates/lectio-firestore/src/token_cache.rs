//! Service-account token caching for Firestore auth.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh tokens 60 seconds before expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Conservative TTL when the provider reports no expiry.
const DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore REST access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Thread-safe token cache. Refresh happens under the write lock, so
/// concurrent callers do not stampede the auth endpoint.
pub struct TokenCache {
    auth: Arc<dyn TokenProvider>,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self { auth, cached: RwLock::new(None) }
    }

    /// Drop the cached token (after a 401 the server no longer accepts it).
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_fresh() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref() {
            if token.is_fresh() {
                return Ok(token.access_token.clone());
            }
        }

        match self.auth.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let access_token = token.as_str().to_string();
                let expires_at = {
                    let now = Utc::now();
                    let exp = token.expires_at();
                    if exp > now {
                        match (exp - now).to_std() {
                            Ok(ttl) => Instant::now() + ttl,
                            Err(_) => Instant::now() + DEFAULT_TTL,
                        }
                    } else {
                        // Force a refresh on the next call
                        Instant::now()
                    }
                };

                *cached = Some(CachedToken { access_token: access_token.clone(), expires_at });
                debug!("Refreshed Firestore auth token");
                Ok(access_token)
            }
            Err(e) => {
                // A stale-but-unexpired token beats failing the request
                if let Some(token) = cached.as_ref() {
                    if token.is_usable() {
                        warn!("Token refresh failed, reusing existing token: {}", e);
                        return Ok(token.access_token.clone());
                    }
                }
                Err(FirestoreError::auth_error(format!("Failed to obtain auth token: {}", e)))
            }
        }
    }
}
