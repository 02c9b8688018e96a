//! Transcript sanitization.

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sanitized transcript plus the language it was fetched in.
///
/// Transient: only the derived counts and the text blob are persisted,
/// never this struct as a document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptResult {
    /// Sanitized transcript text.
    pub text: String,
    /// BCP-47 language tag of the caption track.
    pub language: String,
}

impl TranscriptResult {
    pub fn char_count(&self) -> u32 {
        self.text.chars().count() as u32
    }
}

/// Timestamp markers: `[12:34]`, `[1:02:33]`, `(00:12)`, and bare
/// `hh:mm:ss` tokens that caption tracks embed between cues.
static TIMESTAMP_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\[(]\d{1,2}:\d{2}(?::\d{2})?[\])]|\b\d{1,2}:\d{2}:\d{2}\b").unwrap()
});

/// Runs of whitespace, including newlines left by cue boundaries.
static WHITESPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Normalize raw transcript text.
///
/// Strips timestamp markers, control characters, and emoji, then
/// collapses whitespace runs to single spaces and trims. Idempotent:
/// sanitizing already-sanitized text is a no-op.
pub fn sanitize_transcript(raw: &str) -> String {
    let without_timestamps = TIMESTAMP_MARKERS.replace_all(raw, " ");

    let filtered: String = without_timestamps
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .filter(|c| !is_emoji(*c))
        .collect();

    WHITESPACE_RUNS.replace_all(&filtered, " ").trim().to_string()
}

/// Emoji and pictograph ranges stripped from transcripts.
fn is_emoji(c: char) -> bool {
    matches!(u32::from(c),
        0x1F000..=0x1FAFF   // pictographs, emoticons, symbols, extended-A
        | 0x2600..=0x27BF   // misc symbols + dingbats
        | 0x2B00..=0x2BFF   // arrows/stars used as emoji
        | 0xFE00..=0xFE0F   // variation selectors
        | 0x200D            // zero-width joiner
    )
}
