//! Structured run logging utilities.
//!
//! Every lifecycle message carries the run ID and the platform being
//! processed so interleaved platform logs stay attributable.

use tracing::{error, info, warn, Span};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Per-crate defaults; tracing targets are the crates' module paths.
pub const DEFAULT_LOG_DIRECTIVES: &[&str] = &[
    "vmix_worker=info",
    "vmix_media=info",
    "vmix_ml_client=info",
];

/// `RUST_LOG` filter with the per-crate defaults added.
pub fn default_env_filter() -> EnvFilter {
    DEFAULT_LOG_DIRECTIVES
        .iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(EnvFilter::from_default_env(), EnvFilter::add_directive)
}

/// Logger for one platform within one run.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    platform: String,
}

impl JobLogger {
    pub fn new(job_id: &str, platform: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            platform: platform.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            platform = %self.platform,
            "Platform started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            platform = %self.platform,
            "Platform progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            platform = %self.platform,
            "Platform warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            platform = %self.platform,
            "Platform error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            platform = %self.platform,
            "Platform completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Span to enter around the platform's work.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "platform",
            job_id = %self.job_id,
            platform = %self.platform
        )
    }
}
