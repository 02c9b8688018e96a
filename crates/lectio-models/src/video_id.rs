//! Video id validation and URL extraction.

/// YouTube video ids are exactly 11 characters.
pub const VIDEO_ID_LEN: usize = 11;

/// Validate a video id: exactly 11 alphanumeric/dash/underscore chars.
pub fn is_valid_video_id(id: &str) -> bool {
    id.len() == VIDEO_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract a video id from a watch URL, short URL, or a bare id.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    if is_valid_video_id(input) {
        return Some(input.to_string());
    }

    let candidate = if let Some(v) = input.split("v=").nth(1) {
        v.split('&').next().unwrap_or(v)
    } else if let Some(rest) = input.split("youtu.be/").nth(1) {
        rest.split('?').next().unwrap_or(rest)
    } else if let Some(rest) = input.split("/shorts/").nth(1) {
        rest.split('?').next().unwrap_or(rest)
    } else {
        return None;
    };

    is_valid_video_id(candidate).then(|| candidate.to_string())
}
