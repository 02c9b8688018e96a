//! Transcript blob helpers.
//!
//! Sanitized transcript text is stored in R2 as gzip-compressed bytes
//! so the flashcard pipeline never re-fetches captions upstream.

use std::collections::HashMap;
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use crate::client::R2Client;
use crate::error::{StorageError, StorageResult};

/// Content type for gzip-compressed text.
const CONTENT_TYPE_GZIP: &str = "application/gzip";

/// Tags attached to every stored transcript blob.
#[derive(Debug, Clone)]
pub struct TranscriptBlobMeta {
    pub video_id: String,
    pub language: String,
    pub char_count: u32,
}

/// R2 key for a user's transcript blob.
///
/// Format: `{user_id}/transcripts/{video_id}.txt.gz`
pub fn transcript_key(user_id: &str, video_id: &str) -> String {
    format!("{}/transcripts/{}.txt.gz", user_id, video_id)
}

/// Compress transcript text to gzip bytes.
pub fn compress_transcript(transcript: &str) -> StorageResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(transcript.as_bytes())
        .map_err(|e| StorageError::Serialization(format!("Failed to gzip transcript: {}", e)))?;

    encoder
        .finish()
        .map_err(|e| StorageError::Serialization(format!("Failed to finish gzip encoding: {}", e)))
}

/// Decompress gzip bytes to transcript text.
///
/// Returns `None` if decompression fails (treated as a missing blob).
pub fn decompress_transcript(data: &[u8]) -> Option<String> {
    let mut decoder = GzDecoder::new(data);
    let mut text = String::new();

    if let Err(e) = decoder.read_to_string(&mut text) {
        warn!(error = %e, "Failed to decompress transcript blob");
        return None;
    }

    Some(text)
}

/// Store a transcript blob, tagged with video id, language, and
/// character count. Overwrites any prior blob at the same key, which
/// makes retried ingestions safe.
pub async fn store_transcript(
    r2: &R2Client,
    user_id: &str,
    transcript: &str,
    meta: &TranscriptBlobMeta,
) -> StorageResult<String> {
    let key = transcript_key(user_id, &meta.video_id);
    let compressed = compress_transcript(transcript)?;

    debug!(
        key = %key,
        compressed_size = compressed.len(),
        language = %meta.language,
        "Storing transcript blob"
    );

    let mut metadata = HashMap::new();
    metadata.insert("video-id".to_string(), meta.video_id.clone());
    metadata.insert("language".to_string(), meta.language.clone());
    metadata.insert("char-count".to_string(), meta.char_count.to_string());

    r2.upload_bytes(compressed, &key, CONTENT_TYPE_GZIP, metadata).await?;

    Ok(key)
}

/// Load a transcript blob. `None` when absent or corrupt.
pub async fn load_transcript(r2: &R2Client, user_id: &str, video_id: &str) -> Option<String> {
    let key = transcript_key(user_id, video_id);

    let data = match r2.download_bytes(&key).await {
        Ok(data) => data,
        Err(e) => {
            debug!(key = %key, error = %e, "Transcript blob miss");
            return None;
        }
    };

    decompress_transcript(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_key_format() {
        assert_eq!(
            transcript_key("user123", "dQw4w9WgXcQ"),
            "user123/transcripts/dQw4w9WgXcQ.txt.gz"
        );
    }

    #[test]
    fn test_compress_decompress_round_trip() {
        let text = "so today we are going to cover the krebs cycle in detail";
        let compressed = compress_transcript(text).unwrap();
        assert_eq!(decompress_transcript(&compressed).as_deref(), Some(text));
    }

    #[test]
    fn test_decompress_corrupt_data_is_none() {
        assert_eq!(decompress_transcript(b"definitely not gzip"), None);
    }

    #[test]
    fn test_compress_empty_transcript() {
        let compressed = compress_transcript("").unwrap();
        assert_eq!(decompress_transcript(&compressed).as_deref(), Some(""));
    }
}
