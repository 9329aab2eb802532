//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vmix_media::fs_utils::{WaitPolicy, DEFAULT_READY_MIN_BYTES};
use vmix_media::DEFAULT_CROSSFADE_SECS;

use crate::selection::{DenyList, DEFAULT_DENY_PENALTY};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Run-scoped output directory
    pub output_dir: PathBuf,
    /// Shared directory searched when a candidate is not in the run directory
    pub shared_output_dir: PathBuf,
    /// Crossfade between concatenated segments
    pub crossfade_secs: f64,
    /// How long to wait for a candidate in the run directory
    pub wait_timeout: Duration,
    /// How long to wait in the shared directory afterwards
    pub fallback_wait_timeout: Duration,
    /// Re-check interval while waiting
    pub poll_interval: Duration,
    /// Files smaller than this are not considered materialized
    pub min_candidate_bytes: u64,
    /// Prompt terms that mark a candidate as off-brief
    pub deny_terms: Vec<String>,
    pub deny_penalty: f64,
    /// Haar cascade for face presence
    pub face_cascade: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            shared_output_dir: PathBuf::from("outputs"),
            crossfade_secs: DEFAULT_CROSSFADE_SECS,
            wait_timeout: Duration::from_secs(600),
            fallback_wait_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
            min_candidate_bytes: DEFAULT_READY_MIN_BYTES,
            deny_terms: DenyList::reference_terms(),
            deny_penalty: DEFAULT_DENY_PENALTY,
            face_cascade: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            output_dir: std::env::var("VMIX_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            shared_output_dir: std::env::var("VMIX_SHARED_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.shared_output_dir),
            crossfade_secs: std::env::var("VMIX_CROSSFADE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.crossfade_secs),
            wait_timeout: Duration::from_secs(
                std::env::var("VMIX_WAIT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            fallback_wait_timeout: Duration::from_secs(
                std::env::var("VMIX_FALLBACK_WAIT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            poll_interval: Duration::from_secs(
                std::env::var("VMIX_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            min_candidate_bytes: std::env::var("VMIX_MIN_CANDIDATE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_candidate_bytes),
            deny_terms: std::env::var("VMIX_DENY_TERMS")
                .ok()
                .map(|s| parse_terms(&s))
                .unwrap_or(defaults.deny_terms),
            deny_penalty: std::env::var("VMIX_DENY_PENALTY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.deny_penalty),
            face_cascade: std::env::var("VMIX_FACE_CASCADE")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Polling policy for the run directory.
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            timeout: self.wait_timeout,
            poll_interval: self.poll_interval,
            min_bytes: self.min_candidate_bytes,
        }
    }

    pub fn deny_list(&self) -> DenyList {
        DenyList::new(self.deny_terms.clone(), self.deny_penalty)
    }

    /// Where generated candidates and the manifest live.
    pub fn generated_dir(&self) -> PathBuf {
        self.output_dir.join("generated")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.generated_dir().join("tasks.json")
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join("run_report.json")
    }
}

/// Comma-separated, trimmed, lower-cased, empties dropped.
fn parse_terms(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.crossfade_secs, 0.4);
        assert_eq!(config.wait_timeout, Duration::from_secs(600));
        assert_eq!(config.fallback_wait_timeout, Duration::from_secs(60));
        assert_eq!(config.min_candidate_bytes, 200_000);
        assert_eq!(config.deny_penalty, 80.0);
        assert!(config.deny_terms.contains(&"rice field".to_string()));
        assert_eq!(config.manifest_path(), PathBuf::from("outputs/generated/tasks.json"));
    }

    #[test]
    fn test_parse_terms() {
        assert_eq!(
            parse_terms(" Beach, ,NEON city ,"),
            vec!["beach".to_string(), "neon city".to_string()]
        );
        assert!(parse_terms("").is_empty());
    }
}
