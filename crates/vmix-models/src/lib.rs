//! Shared data models for the ViralMix adaptation pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Remix plans, presets and remix debug metadata
//! - Generated video candidates and the generation manifest
//! - Scoring context, oracle predictions and selection results
//! - Platform profiles and run reports
//! - Optional backend capabilities

pub mod candidate;
pub mod capability;
pub mod platform;
pub mod remix;
pub mod score;

// Re-export common types
pub use candidate::{GenerationTask, VideoCandidate, DEFAULT_VARIANT_ROOT};
pub use capability::Capability;
pub use platform::{PlatformProfile, PlatformResult, RunReport};
pub use remix::{PresetParseError, RemixDebug, RemixPlan, RemixPreset, SegmentBounds};
pub use score::{
    FeatureMap, ScoreBreakdown, ScoreContext, SelectionResult, ViralityPrediction,
    NEUTRAL_VIRALITY_SCORE,
};
