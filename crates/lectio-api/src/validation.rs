//! Request body validation.
//!
//! Handlers take the raw body so the size cap applies to exactly the
//! bytes the client sent, then parse and validate here. All failures
//! surface as invalid_argument.

use serde::Deserialize;
use url::Url;

use lectio_models::video_id::{extract_video_id, is_valid_video_id};

use crate::config::MAX_PAYLOAD_BYTES;
use crate::error::{ApiError, ApiResult};

/// Hosts a videoUrl may point at.
const ALLOWED_HOSTS: [&str; 4] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "youtu.be",
];

fn validate_video_url(raw: &str) -> ApiResult<()> {
    let parsed = Url::parse(raw)
        .map_err(|e| ApiError::invalid_argument(format!("Invalid videoUrl: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ApiError::invalid_argument(format!(
                "Invalid videoUrl protocol '{}'",
                scheme
            )))
        }
    }

    let host = parsed
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or_else(|| ApiError::invalid_argument("videoUrl must have a host"))?;
    if !ALLOWED_HOSTS.contains(&host.as_str()) {
        return Err(ApiError::invalid_argument(
            "videoUrl must point at YouTube",
        ));
    }

    Ok(())
}

/// Parsed and validated body of a preview or ingest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    pub video_id: String,
    pub preferred_language: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawVideoRequest {
    video_id: Option<String>,
    video_url: Option<String>,
    preferred_language: Option<String>,
}

/// Parse a request body, enforcing the payload cap, required fields
/// and the video id shape.
pub fn parse_video_request(body: &[u8]) -> ApiResult<VideoRequest> {
    if body.len() > MAX_PAYLOAD_BYTES {
        return Err(ApiError::invalid_argument(format!(
            "Request body exceeds {} bytes",
            MAX_PAYLOAD_BYTES
        )));
    }

    let raw: RawVideoRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::invalid_argument(format!("Malformed request body: {}", e)))?;

    let video_id = match (raw.video_id, raw.video_url) {
        (Some(id), _) if !id.trim().is_empty() => id.trim().to_string(),
        (_, Some(url)) if !url.trim().is_empty() => {
            let url = url.trim();
            validate_video_url(url)?;
            extract_video_id(url).ok_or_else(|| {
                ApiError::invalid_argument("Could not extract a video id from videoUrl")
            })?
        }
        _ => {
            return Err(ApiError::invalid_argument(
                "Either videoId or videoUrl is required",
            ))
        }
    };

    if !is_valid_video_id(&video_id) {
        return Err(ApiError::invalid_argument(
            "videoId must be an 11-character YouTube video id",
        ));
    }

    let preferred_language = raw
        .preferred_language
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
    if let Some(lang) = &preferred_language {
        if lang.len() > 16 || !lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ApiError::invalid_argument(
                "preferredLanguage must be a BCP-47 language tag",
            ));
        }
    }

    Ok(VideoRequest {
        video_id,
        preferred_language,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_video_id() {
        let req = parse_video_request(br#"{"videoId":"dQw4w9WgXcQ"}"#).unwrap();
        assert_eq!(req.video_id, "dQw4w9WgXcQ");
        assert_eq!(req.preferred_language, None);
    }

    #[test]
    fn test_accepts_video_url() {
        let req =
            parse_video_request(br#"{"videoUrl":"https://youtu.be/dQw4w9WgXcQ"}"#).unwrap();
        assert_eq!(req.video_id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_video_id_wins_over_url() {
        let req = parse_video_request(
            br#"{"videoId":"dQw4w9WgXcQ","videoUrl":"https://youtu.be/AAAAAAAAAAA"}"#,
        )
        .unwrap();
        assert_eq!(req.video_id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_rejects_non_youtube_url() {
        let err = parse_video_request(
            br#"{"videoUrl":"https://evil.example.com/watch?v=dQw4w9WgXcQ"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("YouTube"));

        let err =
            parse_video_request(br#"{"videoUrl":"ftp://youtube.com/watch?v=dQw4w9WgXcQ"}"#)
                .unwrap_err();
        assert!(err.to_string().contains("protocol"));
    }

    #[test]
    fn test_rejects_missing_fields() {
        let err = parse_video_request(br#"{}"#).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
        assert!(err.to_string().contains("required"));
    }

    #[test]
    fn test_rejects_bad_id_shape() {
        let err = parse_video_request(br#"{"videoId":"too-short"}"#).unwrap_err();
        assert!(err.to_string().contains("11-character"));
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let padding = "x".repeat(MAX_PAYLOAD_BYTES);
        let body = format!(r#"{{"videoId":"{}"}}"#, padding);
        let err = parse_video_request(body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = parse_video_request(b"not json").unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err =
            parse_video_request(br#"{"videoId":"dQw4w9WgXcQ","admin":true}"#).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn test_language_tag_validation() {
        let req = parse_video_request(
            br#"{"videoId":"dQw4w9WgXcQ","preferredLanguage":"pt-BR"}"#,
        )
        .unwrap();
        assert_eq!(req.preferred_language.as_deref(), Some("pt-BR"));

        let err = parse_video_request(
            br#"{"videoId":"dQw4w9WgXcQ","preferredLanguage":"no good"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("BCP-47"));

        // Blank language collapses to None
        let req = parse_video_request(
            br#"{"videoId":"dQw4w9WgXcQ","preferredLanguage":"  "}"#,
        )
        .unwrap();
        assert_eq!(req.preferred_language, None);
    }
}
