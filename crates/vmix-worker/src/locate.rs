//! Resolving candidates to files on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};
use vmix_media::fs_utils::{file_size_at_least, wait_with_fallback, WaitPolicy};
use vmix_models::VideoCandidate;

use crate::config::WorkerConfig;

/// Finds the file backing a candidate.
///
/// Lookup order: `final_path`, `path`, then `<task_id>.mp4` in the run's
/// generated directory and finally in the shared generated directory.
#[derive(Debug, Clone)]
pub struct CandidateLocator {
    output_dir: PathBuf,
    shared_dir: PathBuf,
    policy: WaitPolicy,
    fallback_timeout: Duration,
}

impl CandidateLocator {
    pub fn new(output_dir: impl Into<PathBuf>, shared_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            shared_dir: shared_dir.into(),
            policy: WaitPolicy::default(),
            fallback_timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(&config.output_dir, &config.shared_output_dir)
            .with_wait(config.wait_policy(), config.fallback_wait_timeout)
    }

    pub fn with_wait(mut self, policy: WaitPolicy, fallback_timeout: Duration) -> Self {
        self.policy = policy;
        self.fallback_timeout = fallback_timeout;
        self
    }

    pub fn generated_dir(&self) -> PathBuf {
        self.output_dir.join("generated")
    }

    pub fn shared_generated_dir(&self) -> PathBuf {
        self.shared_dir.join("generated")
    }

    /// Every location the candidate may appear at, in lookup order.
    pub fn candidate_paths(&self, candidate: &VideoCandidate) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::new();
        if let Some(final_path) = candidate.final_path.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            paths.push(final_path.clone());
        }
        if !candidate.path.as_os_str().is_empty() {
            paths.push(candidate.path.clone());
        }
        if let Some(task_id) = candidate.task_id() {
            let file = format!("{}.mp4", task_id);
            paths.push(self.generated_dir().join(&file));
            paths.push(self.shared_generated_dir().join(&file));
        }
        paths.dedup();
        paths
    }

    /// First location already holding a complete file, without waiting.
    ///
    /// Files below the wait policy's `min_bytes` are still being written
    /// and do not count.
    pub async fn resolve_existing(&self, candidate: &VideoCandidate) -> Option<PathBuf> {
        for path in self.candidate_paths(candidate) {
            if file_size_at_least(&path, self.policy.min_bytes).await {
                return Some(path);
            }
        }
        None
    }

    /// Wait for the candidate's primary location, then the shared fallback.
    ///
    /// With a task id the primary is `<generated>/<task_id>.mp4`, otherwise
    /// the first known path. Returns `None` on timeout; waiting never fails
    /// the run.
    pub async fn wait_for(&self, candidate: &VideoCandidate) -> Option<PathBuf> {
        if let Some(found) = self.resolve_existing(candidate).await {
            return Some(found);
        }

        let task_file = candidate.task_id().map(|t| format!("{}.mp4", t));
        let primary = match &task_file {
            Some(file) => self.generated_dir().join(file),
            None => self.candidate_paths(candidate).into_iter().next()?,
        };
        let fallback = task_file.map(|file| self.shared_generated_dir().join(file));

        debug!(
            primary = %primary.display(),
            timeout_secs = self.policy.timeout.as_secs(),
            "Waiting for candidate delivery"
        );
        let found = wait_with_fallback(
            &primary,
            fallback.as_deref(),
            &self.policy,
            self.fallback_timeout,
        )
        .await;
        if found.is_none() {
            warn!(
                variant = %candidate.variant,
                primary = %primary.display(),
                "Candidate not delivered before timeout"
            );
        }
        found
    }
}

/// Candidate with `final_path` pointing at a resolved file.
pub fn with_resolved_path(candidate: &VideoCandidate, path: &Path) -> VideoCandidate {
    candidate.clone().with_final_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn locator(dir: &TempDir) -> CandidateLocator {
        CandidateLocator::new(dir.path().join("run"), dir.path().join("shared")).with_wait(
            WaitPolicy {
                timeout: Duration::from_millis(50),
                poll_interval: Duration::from_millis(10),
                min_bytes: 4,
            },
            Duration::from_millis(50),
        )
    }

    #[test]
    fn test_lookup_order() {
        let dir = TempDir::new().unwrap();
        let loc = locator(&dir);
        let candidate = VideoCandidate::from_path("planned.mp4", "V1")
            .with_final_path("delivered.mp4")
            .with_task_id("manual_tiktok_01_abc");

        let paths = loc.candidate_paths(&candidate);
        assert_eq!(paths[0], PathBuf::from("delivered.mp4"));
        assert_eq!(paths[1], PathBuf::from("planned.mp4"));
        assert_eq!(paths[2], dir.path().join("run/generated/manual_tiktok_01_abc.mp4"));
        assert_eq!(paths[3], dir.path().join("shared/generated/manual_tiktok_01_abc.mp4"));
    }

    #[tokio::test]
    async fn test_resolve_prefers_final_then_task_dirs() {
        let dir = TempDir::new().unwrap();
        let loc = locator(&dir);
        let shared = loc.shared_generated_dir();
        std::fs::create_dir_all(&shared).unwrap();
        std::fs::write(shared.join("t1.mp4"), b"video").unwrap();

        let candidate = VideoCandidate::from_path(dir.path().join("missing.mp4"), "V1").with_task_id("t1");
        assert_eq!(loc.resolve_existing(&candidate).await, Some(shared.join("t1.mp4")));

        let none = VideoCandidate::from_path(dir.path().join("missing.mp4"), "V2");
        assert_eq!(loc.resolve_existing(&none).await, None);
    }

    #[tokio::test]
    async fn test_partial_file_is_not_resolved() {
        let dir = TempDir::new().unwrap();
        let loc = locator(&dir);
        let partial = dir.path().join("partial.mp4");
        std::fs::write(&partial, b"x").unwrap();

        let candidate = VideoCandidate::from_path(&partial, "V1");
        assert_eq!(loc.resolve_existing(&candidate).await, None);

        std::fs::write(&partial, b"complete").unwrap();
        assert_eq!(loc.resolve_existing(&candidate).await, Some(partial));
    }

    #[tokio::test]
    async fn test_wait_watches_generated_dir_for_task() {
        let dir = TempDir::new().unwrap();
        let loc = locator(&dir).with_wait(
            WaitPolicy {
                timeout: Duration::from_secs(5),
                poll_interval: Duration::from_millis(10),
                min_bytes: 4,
            },
            Duration::from_millis(50),
        );
        // planned path never appears; the generator delivers by task id
        let candidate = VideoCandidate::from_path(dir.path().join("tiktok_01_V1.mp4"), "V1")
            .with_task_id("manual_tiktok_01_0123456789");
        let delivered = loc.generated_dir().join("manual_tiktok_01_0123456789.mp4");

        let writer = {
            let delivered = delivered.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                tokio::fs::create_dir_all(delivered.parent().unwrap()).await.unwrap();
                tokio::fs::write(&delivered, b"complete").await.unwrap();
            })
        };
        assert_eq!(loc.wait_for(&candidate).await, Some(delivered));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_times_out_softly() {
        let dir = TempDir::new().unwrap();
        let loc = locator(&dir);
        let candidate = VideoCandidate::from_path(dir.path().join("never.mp4"), "V1").with_task_id("t9");
        assert_eq!(loc.wait_for(&candidate).await, None);
    }

    #[tokio::test]
    async fn test_wait_finds_late_delivery() {
        let dir = TempDir::new().unwrap();
        let loc = locator(&dir).with_wait(
            WaitPolicy {
                timeout: Duration::from_secs(5),
                poll_interval: Duration::from_millis(10),
                min_bytes: 4,
            },
            Duration::from_millis(50),
        );
        let target = dir.path().join("late.mp4");
        let candidate = VideoCandidate::from_path(&target, "V1");

        let writer = {
            let target = target.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                tokio::fs::write(&target, b"complete").await.unwrap();
            })
        };
        assert_eq!(loc.wait_for(&candidate).await, Some(target));
        writer.await.unwrap();
    }
}
