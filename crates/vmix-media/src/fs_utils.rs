//! Filesystem utilities for files delivered by external producers.
//!
//! Generated clips land on disk asynchronously (a callback server writes
//! them while this process is running). A file only counts as ready once it
//! reaches a minimum size, so partially written downloads are not picked up.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::time::Instant;

use crate::error::MediaResult;

/// Default size below which a delivered clip is considered still in flight.
pub const DEFAULT_READY_MIN_BYTES: u64 = 200_000;

/// How long and how often to poll for a delivered file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub min_bytes: u64,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(2),
            min_bytes: DEFAULT_READY_MIN_BYTES,
        }
    }
}

impl WaitPolicy {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Whether `path` exists and holds at least `min_bytes` bytes.
///
/// Metadata errors count as "not yet".
pub async fn file_size_at_least(path: &Path, min_bytes: u64) -> bool {
    match fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() >= min_bytes,
        Err(_) => false,
    }
}

/// Poll until `path` is ready or the policy's timeout elapses.
///
/// Returns `true` as soon as the file is ready. The file is always checked
/// at least once, even with a zero timeout.
pub async fn wait_for_file(path: &Path, policy: &WaitPolicy) -> bool {
    let started = Instant::now();
    loop {
        if file_size_at_least(path, policy.min_bytes).await {
            return true;
        }
        if started.elapsed() + policy.poll_interval > policy.timeout {
            tracing::debug!(
                path = %path.display(),
                timeout_secs = policy.timeout.as_secs(),
                "gave up waiting for file"
            );
            return false;
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}

/// Wait for `primary`; if it never becomes ready, wait (with the shorter
/// `fallback_timeout`) for `fallback`.
///
/// Returns the path that became ready, if any.
pub async fn wait_with_fallback(
    primary: &Path,
    fallback: Option<&Path>,
    policy: &WaitPolicy,
    fallback_timeout: Duration,
) -> Option<PathBuf> {
    if wait_for_file(primary, policy).await {
        return Some(primary.to_path_buf());
    }
    let fallback = fallback.filter(|f| *f != primary)?;
    let fallback_policy = policy.with_timeout(fallback_timeout);
    if wait_for_file(fallback, &fallback_policy).await {
        tracing::info!(
            primary = %primary.display(),
            fallback = %fallback.display(),
            "file delivered to fallback location"
        );
        return Some(fallback.to_path_buf());
    }
    None
}

/// Create the parent directory of `path` if needed.
pub async fn ensure_parent_dir(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}
