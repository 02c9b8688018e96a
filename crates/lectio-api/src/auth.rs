//! Firebase ID token authentication.

use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use reqwest::Client;
use serde::Deserialize;

use crate::error::ApiError;
use crate::jwks::RemoteKeySet;
use crate::state::AppState;

/// Google JWKS URL for Firebase Auth signing keys.
const AUTH_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Claims we read from a Firebase ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
}

/// Verifies Firebase ID tokens against the cached Google key set.
pub struct AuthVerifier {
    keys: RemoteKeySet,
    project_id: String,
}

impl AuthVerifier {
    pub fn new(project_id: impl Into<String>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            keys: RemoteKeySet::new(http, AUTH_JWKS_URL),
            project_id: project_id.into(),
        })
    }

    pub async fn verify(&self, token: &str) -> Result<IdTokenClaims, ApiError> {
        let header = decode_header(token)
            .map_err(|e| ApiError::unauthenticated(format!("Invalid token header: {}", e)))?;
        let kid = header
            .kid
            .ok_or_else(|| ApiError::unauthenticated("Token missing key ID"))?;

        let key = self
            .keys
            .get_key(&kid)
            .await
            .ok_or_else(|| ApiError::unauthenticated("Unknown signing key"))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!("{}{}", ISSUER_PREFIX, self.project_id)]);
        validation.set_audience(&[&self.project_id]);

        let data = decode::<IdTokenClaims>(token, &key, &validation)
            .map_err(|e| ApiError::unauthenticated(format!("Token validation failed: {}", e)))?;

        if data.claims.sub.is_empty() {
            return Err(ApiError::unauthenticated("Token missing subject"));
        }

        Ok(data.claims)
    }
}

/// Authenticated user extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthenticated("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthenticated("Invalid Authorization header format"))?;

        let claims = state.auth.verify(token).await?;

        Ok(AuthUser {
            uid: claims.sub,
            email: claims.email,
        })
    }
}
