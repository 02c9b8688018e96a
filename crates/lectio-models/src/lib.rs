//! Shared data models for the Lectio backend.
//!
//! Everything in this crate is pure data and pure functions: plan
//! tiers, the material artifact record, token cost estimation, and
//! transcript sanitization. No I/O happens here.

pub mod account;
pub mod estimate;
pub mod material;
pub mod transcript;
pub mod video_id;

pub use account::{PlanLimits, PlanTier, UserAccount};
pub use estimate::{
    estimate_billed_units, estimate_cost, estimate_input_tokens, CostEstimate,
    DEFAULT_OUTPUT_TOKENS, ML_TOKEN_UNIT_SIZE,
};
pub use material::{Material, MaterialKind, MaterialStatus};
pub use transcript::{sanitize_transcript, TranscriptResult};
pub use video_id::{extract_video_id, is_valid_video_id, VIDEO_ID_LEN};
