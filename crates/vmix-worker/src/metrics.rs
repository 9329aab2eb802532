//! Selection and run metrics.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::warn;

/// Metric names as constants for consistency.
pub mod names {
    pub const CANDIDATES_SCORED_TOTAL: &str = "vmix_candidates_scored_total";
    pub const CANDIDATES_SKIPPED_TOTAL: &str = "vmix_candidates_skipped_total";
    pub const CANDIDATE_SCORE: &str = "vmix_candidate_score";
    pub const SELECTIONS_WITHOUT_WINNER_TOTAL: &str = "vmix_selections_without_winner_total";
    pub const PLATFORM_RUNS_TOTAL: &str = "vmix_platform_runs_total";
}

/// Install the Prometheus recorder; `None` if one is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder not installed: {}", e);
            None
        }
    }
}

pub fn record_candidate_scored(total: f64, penalized: bool) {
    let labels = [("penalized", penalized.to_string())];
    counter!(names::CANDIDATES_SCORED_TOTAL, &labels).increment(1);
    histogram!(names::CANDIDATE_SCORE).record(total);
}

pub fn record_candidate_skipped() {
    counter!(names::CANDIDATES_SKIPPED_TOTAL).increment(1);
}

pub fn record_selection_without_winner() {
    counter!(names::SELECTIONS_WITHOUT_WINNER_TOTAL).increment(1);
}

pub fn record_platform_run(platform: &str, success: bool) {
    let labels = [
        ("platform", platform.to_string()),
        ("status", if success { "ok" } else { "failed" }.to_string()),
    ];
    counter!(names::PLATFORM_RUNS_TOTAL, &labels).increment(1);
}
