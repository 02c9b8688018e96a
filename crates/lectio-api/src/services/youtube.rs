//! YouTube metadata and caption fetching.
//!
//! Metadata comes from the public oEmbed endpoint; duration and the
//! caption track list are scraped from the watch page, since neither
//! is exposed without an API key. Caption tracks point at timedtext
//! XML which we flatten into plain text.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use lectio_models::transcript::TranscriptResult;

use crate::error::{ApiError, ApiResult};

static LENGTH_SECONDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""lengthSeconds"\s*:\s*"(\d+)""#).unwrap()
});

static CAPTION_TRACKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""captionTracks"\s*:\s*(\[.*?\])"#).unwrap()
});

static CAPTION_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<text[^>]*>(.*?)</text>").unwrap()
});

/// Basic details about a video, assembled from oEmbed plus the watch page.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: u32,
    pub caption_languages: Vec<String>,
}

impl VideoMetadata {
    pub fn captions_available(&self) -> bool {
        !self.caption_languages.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct OembedResponse {
    title: String,
    author_name: String,
    thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
}

/// Client for YouTube's public endpoints.
pub struct YouTubeClient {
    http: Client,
    base_url: String,
}

impl YouTubeClient {
    pub fn new() -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent("Mozilla/5.0 (compatible; lectio/1.0)")
            .build()
            .map_err(|e| ApiError::internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: "https://www.youtube.com".to_string(),
        })
    }

    /// Point the client at a different host. Used by tests.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch title, channel, duration and caption languages for a video.
    ///
    /// oEmbed failures degrade to placeholder title and channel rather
    /// than failing the whole request; the watch page is required.
    pub async fn fetch_metadata(&self, video_id: &str) -> ApiResult<VideoMetadata> {
        let page = self.fetch_watch_page(video_id).await?;
        let duration_seconds = parse_length_seconds(&page).unwrap_or(0);
        let caption_languages = parse_caption_tracks(&page)
            .into_iter()
            .map(|t| t.language_code)
            .collect();

        let (title, channel, thumbnail_url) = match self.fetch_oembed(video_id).await {
            Ok(oembed) => (oembed.title, oembed.author_name, oembed.thumbnail_url),
            Err(e) => {
                warn!(video_id, error = %e, "oEmbed lookup failed, using placeholders");
                (format!("YouTube video {}", video_id), String::new(), None)
            }
        };

        Ok(VideoMetadata {
            video_id: video_id.to_string(),
            title,
            channel,
            thumbnail_url,
            duration_seconds,
            caption_languages,
        })
    }

    /// Fetch the transcript for a video, preferring `preferred_language`
    /// when that track exists. Returns `None` when the video has no
    /// caption tracks at all.
    pub async fn fetch_transcript(
        &self,
        video_id: &str,
        preferred_language: Option<&str>,
    ) -> ApiResult<Option<TranscriptResult>> {
        let page = self.fetch_watch_page(video_id).await?;
        let tracks = parse_caption_tracks(&page);
        if tracks.is_empty() {
            return Ok(None);
        }

        let track = preferred_language
            .and_then(|lang| tracks.iter().find(|t| t.language_code == lang))
            .unwrap_or(&tracks[0]);

        debug!(video_id, language = %track.language_code, "fetching caption track");

        let xml = self
            .http
            .get(&track.base_url)
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("caption fetch failed: {}", e)))?
            .error_for_status()
            .map_err(|e| ApiError::internal(format!("caption fetch failed: {}", e)))?
            .text()
            .await
            .map_err(|e| ApiError::internal(format!("caption fetch failed: {}", e)))?;

        let text = parse_transcript_xml(&xml);
        if text.is_empty() {
            return Ok(None);
        }

        Ok(Some(TranscriptResult {
            text,
            language: track.language_code.clone(),
        }))
    }

    async fn fetch_watch_page(&self, video_id: &str) -> ApiResult<String> {
        let url = format!("{}/watch?v={}", self.base_url, video_id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("watch page fetch failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::not_found("Video not found"));
        }
        let response = response
            .error_for_status()
            .map_err(|e| ApiError::internal(format!("watch page fetch failed: {}", e)))?;

        response
            .text()
            .await
            .map_err(|e| ApiError::internal(format!("watch page fetch failed: {}", e)))
    }

    async fn fetch_oembed(&self, video_id: &str) -> ApiResult<OembedResponse> {
        let url = format!(
            "{}/oembed?url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3D{}&format=json",
            self.base_url, video_id
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("oEmbed fetch failed: {}", e)))?
            .error_for_status()
            .map_err(|e| ApiError::internal(format!("oEmbed fetch failed: {}", e)))?;

        response
            .json()
            .await
            .map_err(|e| ApiError::internal(format!("oEmbed parse failed: {}", e)))
    }
}

fn parse_length_seconds(page: &str) -> Option<u32> {
    LENGTH_SECONDS
        .captures(page)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_caption_tracks(page: &str) -> Vec<RawCaptionTrack> {
    let Some(captures) = CAPTION_TRACKS.captures(page) else {
        return Vec::new();
    };
    let Some(json) = captures.get(1) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<RawCaptionTrack>>(json.as_str()) {
        Ok(tracks) => tracks,
        Err(e) => {
            warn!(error = %e, "failed to parse caption track list");
            Vec::new()
        }
    }
}

/// Flatten timedtext XML into plain text, one space between cues.
fn parse_transcript_xml(xml: &str) -> String {
    let mut parts = Vec::new();
    for captures in CAPTION_TEXT.captures_iter(xml) {
        if let Some(body) = captures.get(1) {
            let cue = decode_entities(body.as_str());
            let cue = cue.trim();
            if !cue.is_empty() {
                parts.push(cue.to_string());
            }
        }
    }
    parts.join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;#39;", "'")
        .replace("&amp;quot;", "\"")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WATCH_PAGE: &str = r#"<html>var ytInitialPlayerResponse = {"videoDetails":{"videoId":"dQw4w9WgXcQ","lengthSeconds":"212"},"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"__CAPTIONS__","languageCode":"en"},{"baseUrl":"__CAPTIONS_ES__","languageCode":"es"}]}}};</html>"#;

    #[test]
    fn test_parse_length_seconds() {
        assert_eq!(parse_length_seconds(WATCH_PAGE), Some(212));
        assert_eq!(parse_length_seconds("<html></html>"), None);
    }

    #[test]
    fn test_parse_caption_tracks() {
        let tracks = parse_caption_tracks(WATCH_PAGE);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].language_code, "en");
        assert_eq!(tracks[1].language_code, "es");
        assert!(parse_caption_tracks("no captions here").is_empty());
    }

    #[test]
    fn test_parse_transcript_xml() {
        let xml = r#"<transcript><text start="0" dur="2">hello &amp;#39;world&amp;#39;</text><text start="2" dur="2">  second line  </text><text start="4" dur="1"></text></transcript>"#;
        assert_eq!(parse_transcript_xml(xml), "hello 'world' second line");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &quot;d&quot;"), "a & b <c> \"d\"");
    }

    #[tokio::test]
    async fn test_fetch_metadata_with_oembed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .and(query_param("v", "dQw4w9WgXcQ"))
            .respond_with(ResponseTemplate::new(200).set_body_string(WATCH_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "Never Gonna Give You Up",
                "author_name": "Rick Astley",
                "thumbnail_url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
            })))
            .mount(&server)
            .await;

        let client = YouTubeClient::with_base_url(server.uri());
        let meta = client.fetch_metadata("dQw4w9WgXcQ").await.unwrap();
        assert_eq!(meta.title, "Never Gonna Give You Up");
        assert_eq!(meta.channel, "Rick Astley");
        assert_eq!(meta.duration_seconds, 212);
        assert_eq!(meta.caption_languages, vec!["en", "es"]);
        assert!(meta.captions_available());
    }

    #[tokio::test]
    async fn test_fetch_metadata_degrades_without_oembed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string(WATCH_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = YouTubeClient::with_base_url(server.uri());
        let meta = client.fetch_metadata("dQw4w9WgXcQ").await.unwrap();
        assert_eq!(meta.title, "YouTube video dQw4w9WgXcQ");
        assert_eq!(meta.duration_seconds, 212);
    }

    #[tokio::test]
    async fn test_fetch_transcript_prefers_language() {
        let server = MockServer::start().await;
        let page = WATCH_PAGE
            .replace("__CAPTIONS__", &format!("{}/timedtext/en", server.uri()))
            .replace("__CAPTIONS_ES__", &format!("{}/timedtext/es", server.uri()));
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/timedtext/es"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<transcript><text start="0" dur="2">hola mundo</text></transcript>"#,
            ))
            .mount(&server)
            .await;

        let client = YouTubeClient::with_base_url(server.uri());
        let transcript = client
            .fetch_transcript("dQw4w9WgXcQ", Some("es"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transcript.language, "es");
        assert_eq!(transcript.text, "hola mundo");
    }

    #[tokio::test]
    async fn test_fetch_transcript_none_without_tracks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>no captions</html>"))
            .mount(&server)
            .await;

        let client = YouTubeClient::with_base_url(server.uri());
        let transcript = client.fetch_transcript("dQw4w9WgXcQ", None).await.unwrap();
        assert!(transcript.is_none());
    }
}
