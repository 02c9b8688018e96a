//! R2 blob storage for transcript text.
//!
//! Sanitized transcripts are stored gzip-compressed, keyed by owner
//! and video id, with the language and character count carried as
//! object metadata.

pub mod client;
pub mod error;
pub mod transcript_blob;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use transcript_blob::{
    compress_transcript, decompress_transcript, load_transcript, store_transcript, transcript_key,
    TranscriptBlobMeta,
};
