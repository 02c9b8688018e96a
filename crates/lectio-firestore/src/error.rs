//! Firestore error types.

use thiserror::Error;

/// Result type for Firestore operations.
pub type FirestoreResult<T> = Result<T, FirestoreError>;

/// Errors that can occur during Firestore operations.
#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FirestoreError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map an HTTP status plus body text to a typed error.
    pub fn from_http_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::PermissionDenied(body),
            404 => Self::NotFound(body),
            409 => Self::AlreadyExists(body),
            429 => Self::RateLimited(1000),
            400 | 412 if body.contains("FAILED_PRECONDITION") => Self::PreconditionFailed(body),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Check if error is retryable (transient network / throttling).
    pub fn is_retryable(&self) -> bool {
        match self {
            FirestoreError::Network(_) | FirestoreError::RateLimited(_) => true,
            FirestoreError::RequestFailed(msg) => msg.starts_with("HTTP 5"),
            _ => false,
        }
    }

    /// Suggested retry delay for throttled requests.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            FirestoreError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// True if the error was caused by a failed write precondition
    /// (updateTime mismatch on the account document).
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, FirestoreError::PreconditionFailed(_))
    }

    /// True if a create with `exists: false` lost to a concurrent create.
    ///
    /// Firestore reports this either as ALREADY_EXISTS or as a failed
    /// precondition depending on the write shape.
    pub fn is_already_exists(&self) -> bool {
        match self {
            FirestoreError::AlreadyExists(_) => true,
            FirestoreError::PreconditionFailed(msg) => msg.contains("ALREADY_EXISTS"),
            _ => false,
        }
    }
}
