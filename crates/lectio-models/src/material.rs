//! Material artifact record.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of study material. Only video transcripts exist today; the tag
/// is stored so future kinds can share the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    #[default]
    VideoTranscript,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::VideoTranscript => "video_transcript",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "video_transcript" => Some(MaterialKind::VideoTranscript),
            _ => None,
        }
    }
}

/// Material lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaterialStatus {
    #[default]
    Ready,
    Failed,
}

impl MaterialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialStatus::Ready => "ready",
            MaterialStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ready" => Some(MaterialStatus::Ready),
            "failed" => Some(MaterialStatus::Failed),
            _ => None,
        }
    }
}

/// A study material created from one ingested video.
///
/// Exactly one material exists per (owner, video) pair. The document id
/// is the 11-character video id itself, which makes that pair the
/// structural identity of the record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Material {
    /// Document id (the source video id).
    pub material_id: String,
    /// Owner user id.
    pub owner_id: String,
    /// Source video id.
    pub video_id: String,
    /// Material kind tag.
    pub kind: MaterialKind,
    /// Video title (best effort, may be synthetic).
    pub title: String,
    /// Video duration in seconds.
    pub duration_seconds: u32,
    /// Sanitized transcript length in characters.
    pub char_count: u32,
    /// Estimated input tokens for downstream generation.
    pub input_tokens: u32,
    /// ML tokens debited for this ingestion.
    pub billed_units: u32,
    /// Detected transcript language (BCP-47 tag).
    pub language: String,
    /// Lifecycle status.
    pub status: MaterialStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Material {
    /// Build a new ready material for an ingested video.
    #[allow(clippy::too_many_arguments)]
    pub fn new_video_transcript(
        owner_id: impl Into<String>,
        video_id: impl Into<String>,
        title: impl Into<String>,
        duration_seconds: u32,
        char_count: u32,
        input_tokens: u32,
        billed_units: u32,
        language: impl Into<String>,
    ) -> Self {
        let video_id = video_id.into();
        Self {
            material_id: video_id.clone(),
            owner_id: owner_id.into(),
            video_id,
            kind: MaterialKind::VideoTranscript,
            title: title.into(),
            duration_seconds,
            char_count,
            input_tokens,
            billed_units,
            language: language.into(),
            status: MaterialStatus::Ready,
            created_at: Utc::now(),
        }
    }
}
