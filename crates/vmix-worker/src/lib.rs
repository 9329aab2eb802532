//! Per-platform adaptation worker.
//!
//! This crate provides:
//! - Candidate location, scoring and best-candidate selection
//! - Variant grouping and segment concatenation
//! - Generation manifest simulate/resume
//! - The per-platform pipeline and run report
//! - Configuration, structured logging and metrics

pub mod config;
pub mod error;
pub mod grouping;
pub mod locate;
pub mod logging;
pub mod manifest;
pub mod metrics;
pub mod pipeline;
pub mod selection;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use grouping::{collect_concat_paths, concat_groups, group_by_root, safe_name, VariantGroup};
pub use locate::CandidateLocator;
pub use logging::JobLogger;
pub use manifest::{Manifest, VideoPrompt};
pub use pipeline::{default_preset, CandidateMode, Pipeline, RunRequest};
pub use selection::{
    composite_score, CandidateFeatureSource, CandidateSelector, DenyList, NoCandidateFeatures,
    VideoFeatureSource, DEFAULT_DENY_PENALTY,
};
