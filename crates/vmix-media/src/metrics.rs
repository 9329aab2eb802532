//! Media processing metrics.
//!
//! Recorded through the `metrics` facade; the binary decides which
//! recorder (if any) is installed.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const REMIX_DURATION_SECONDS: &str = "vmix_remix_duration_seconds";
    pub const REMIX_TOTAL: &str = "vmix_remix_total";
    pub const CONCAT_TOTAL: &str = "vmix_concat_total";
    pub const CONCAT_INPUTS: &str = "vmix_concat_inputs";
    pub const FFMPEG_FAILURES_TOTAL: &str = "vmix_ffmpeg_failures_total";
    pub const WINDOW_SELECTIONS_TOTAL: &str = "vmix_window_selections_total";
}

/// Record a finished remix pass.
pub fn record_remix(stretched: bool, overlaid: bool, duration_secs: f64) {
    let labels = [
        ("stretched", stretched.to_string()),
        ("overlay", overlaid.to_string()),
    ];
    counter!(names::REMIX_TOTAL, &labels).increment(1);
    histogram!(names::REMIX_DURATION_SECONDS).record(duration_secs);
}

/// Record a concatenation attempt.
pub fn record_concat(inputs: usize, success: bool) {
    let labels = [("status", if success { "ok" } else { "failed" }.to_string())];
    counter!(names::CONCAT_TOTAL, &labels).increment(1);
    histogram!(names::CONCAT_INPUTS).record(inputs as f64);
}

/// Record a failed external transcoder run.
pub fn record_ffmpeg_failure(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!(names::FFMPEG_FAILURES_TOTAL, &labels).increment(1);
}

/// Record a video window selection and whether it fell back to offset 0.
pub fn record_window_selection(fallback: bool) {
    let labels = [("fallback", fallback.to_string())];
    counter!(names::WINDOW_SELECTIONS_TOTAL, &labels).increment(1);
}
