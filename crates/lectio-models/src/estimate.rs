//! Token cost estimation.
//!
//! Pure, deterministic conversions from transcript size to input-token
//! and billed-unit ("ML token") estimates. The ledger and the preview
//! path both go through these functions so preview numbers match what
//! ingestion actually charges.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Characters per input token for transcript text.
pub const CHARS_PER_TOKEN: u32 = 4;

/// Default output-token allowance added to every billed estimate.
pub const DEFAULT_OUTPUT_TOKENS: u32 = 500;

/// Tokens (input + output) covered by one ML token.
pub const ML_TOKEN_UNIT_SIZE: u32 = 750;

/// Assumed speech rate when the transcript length is unknown.
const WORDS_PER_MINUTE: u32 = 150;

/// Average word length in characters, trailing space included.
const AVG_WORD_CHARS: u32 = 6;

/// Cost estimate for one ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CostEstimate {
    /// Estimated input tokens.
    pub input_tokens: u32,
    /// ML tokens that would be debited.
    pub billed_units: u32,
}

/// Estimate input tokens from video duration and, when known, the
/// exact transcript character count.
///
/// With a known character count this is `ceil(chars / 4)`. Without one
/// (preview before the transcript is fetched) it approximates from the
/// duration at 150 words per minute.
pub fn estimate_input_tokens(duration_seconds: u32, char_count: Option<u32>) -> u32 {
    match char_count {
        Some(chars) => chars.div_ceil(CHARS_PER_TOKEN),
        None => {
            let approx_chars =
                (duration_seconds as u64 * WORDS_PER_MINUTE as u64 * AVG_WORD_CHARS as u64) / 60;
            (approx_chars as u32).div_ceil(CHARS_PER_TOKEN)
        }
    }
}

/// ML tokens billed for a given input-token estimate:
/// `ceil((input_tokens + output_default) / unit_size)`.
pub fn estimate_billed_units(input_tokens: u32, output_tokens_default: u32, unit_size: u32) -> u32 {
    debug_assert!(unit_size > 0);
    (input_tokens + output_tokens_default).div_ceil(unit_size)
}

/// Full estimate with the gateway's fixed billing constants.
pub fn estimate_cost(duration_seconds: u32, char_count: Option<u32>) -> CostEstimate {
    let input_tokens = estimate_input_tokens(duration_seconds, char_count);
    CostEstimate {
        input_tokens,
        billed_units: estimate_billed_units(input_tokens, DEFAULT_OUTPUT_TOKENS, ML_TOKEN_UNIT_SIZE),
    }
}
