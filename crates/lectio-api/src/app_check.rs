//! Firebase App Check attestation verification.
//!
//! Every gateway request must carry an `X-Firebase-AppCheck` token
//! proving it came from the registered client app. A missing token is
//! unauthenticated; a token that fails verification or names a
//! different app is a permission failure.

use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::error::ApiError;
use crate::jwks::RemoteKeySet;
use crate::state::AppState;

const APP_CHECK_JWKS_URL: &str = "https://firebaseappcheck.googleapis.com/v1/jwks";
const APP_CHECK_ISSUER_PREFIX: &str = "https://firebaseappcheck.googleapis.com/";

pub const APP_CHECK_HEADER: &str = "X-Firebase-AppCheck";

#[derive(Debug, Deserialize)]
struct AppCheckClaims {
    /// The attested app id.
    sub: String,
    /// Audiences, each of the form `projects/{project_number}`.
    aud: Vec<String>,
}

/// Verifies App Check attestation tokens.
pub struct AppCheckVerifier {
    keys: RemoteKeySet,
    /// Registered app id, e.g. `1:123456789:web:abc123`.
    expected_app_id: String,
    /// Project number parsed out of the app id.
    project_number: String,
}

impl AppCheckVerifier {
    pub fn new(expected_app_id: impl Into<String>) -> Result<Self, ApiError> {
        let expected_app_id = expected_app_id.into();
        // App ids are `{version}:{project_number}:{platform}:{hash}`
        let project_number = expected_app_id
            .split(':')
            .nth(1)
            .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            .ok_or_else(|| {
                ApiError::internal(format!("malformed App Check app id: {}", expected_app_id))
            })?
            .to_string();

        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            keys: RemoteKeySet::new(http, APP_CHECK_JWKS_URL),
            expected_app_id,
            project_number,
        })
    }

    /// Verify an attestation token and check it names our app.
    pub async fn verify(&self, token: &str) -> Result<(), ApiError> {
        let header = decode_header(token)
            .map_err(|_| ApiError::permission_denied("App attestation failed"))?;
        let kid = header
            .kid
            .ok_or_else(|| ApiError::permission_denied("App attestation failed"))?;

        let key = self
            .keys
            .get_key(&kid)
            .await
            .ok_or_else(|| ApiError::permission_denied("App attestation failed"))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!(
            "{}{}",
            APP_CHECK_ISSUER_PREFIX, self.project_number
        )]);
        // Audience is a list claim, checked manually below
        validation.validate_aud = false;

        let data = decode::<AppCheckClaims>(token, &key, &validation).map_err(|e| {
            warn!(error = %e, "App Check token rejected");
            ApiError::permission_denied("App attestation failed")
        })?;

        let expected_aud = format!("projects/{}", self.project_number);
        if !data.claims.aud.iter().any(|a| a == &expected_aud) {
            warn!("App Check token for wrong project");
            return Err(ApiError::permission_denied("App attestation failed"));
        }

        if data.claims.sub != self.expected_app_id {
            warn!(app_id = %data.claims.sub, "App Check token from unregistered app");
            return Err(ApiError::permission_denied("App attestation failed"));
        }

        Ok(())
    }
}

/// Marker extractor proving the request carried valid attestation.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedApp;

#[axum::async_trait]
impl FromRequestParts<AppState> for VerifiedApp {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(APP_CHECK_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthenticated("Missing app attestation token"))?;

        state.app_check.verify(token).await?;

        Ok(VerifiedApp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_number_parsed_from_app_id() {
        let v = AppCheckVerifier::new("1:123456789:web:abc123").unwrap();
        assert_eq!(v.project_number, "123456789");
    }

    #[test]
    fn test_malformed_app_id_rejected() {
        assert!(AppCheckVerifier::new("not-an-app-id").is_err());
        assert!(AppCheckVerifier::new("1:notdigits:web:x").is_err());
    }
}
