//! Shared JWKS key-set cache.
//!
//! Both the Firebase Auth verifier and the App Check verifier pull
//! RSA public keys from a Google JWKS endpoint. Keys are cached for an
//! hour; a failed refresh keeps serving the previous key set.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const KEY_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Deserialize)]
struct JwkKey {
    kid: String,
    n: String,
    e: String,
}

/// Cached RSA key set fetched from one JWKS URL.
pub struct RemoteKeySet {
    http: Client,
    url: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_refresh: RwLock<Option<Instant>>,
}

impl RemoteKeySet {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            keys: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(None),
        }
    }

    async fn refresh(&self) -> Result<(), String> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| format!("JWKS fetch failed: {}", e))?
            .error_for_status()
            .map_err(|e| format!("JWKS fetch failed: {}", e))?;

        let jwks: JwksResponse = response
            .json()
            .await
            .map_err(|e| format!("JWKS parse failed: {}", e))?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys.insert(jwk.kid, key);
                }
                Err(e) => warn!(kid = %jwk.kid, error = %e, "skipping malformed JWK"),
            }
        }

        debug!(url = %self.url, count = keys.len(), "refreshed JWKS keys");
        *self.keys.write().await = keys;
        *self.last_refresh.write().await = Some(Instant::now());
        Ok(())
    }

    /// Fetch the decoding key for a key id, refreshing the set when it
    /// is stale or the kid is unknown.
    pub async fn get_key(&self, kid: &str) -> Option<DecodingKey> {
        let stale = {
            let last = self.last_refresh.read().await;
            last.map(|t| t.elapsed() > KEY_CACHE_TTL).unwrap_or(true)
        };

        if stale {
            if let Err(e) = self.refresh().await {
                warn!(url = %self.url, error = %e, "JWKS refresh failed, serving cached keys");
            }
        }

        if let Some(key) = self.keys.read().await.get(kid) {
            return Some(key.clone());
        }

        // Unknown kid on a fresh cache usually means key rotation
        if !stale {
            if let Err(e) = self.refresh().await {
                warn!(url = %self.url, error = %e, "JWKS refresh failed");
                return None;
            }
        }
        self.keys.read().await.get(kid).cloned()
    }
}
