//! Service endpoints from the environment.

use std::time::Duration;

/// Where the scoring and embedding services live.
///
/// A missing URL means the matching oracle falls back to its neutral form.
#[derive(Debug, Clone, PartialEq)]
pub struct MlClientConfig {
    pub scorer_url: Option<String>,
    pub embedding_url: Option<String>,
    pub timeout: Duration,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            scorer_url: None,
            embedding_url: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl MlClientConfig {
    /// Read `VMIX_SCORER_URL`, `VMIX_EMBEDDING_URL` and `VMIX_ML_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            scorer_url: non_empty("VMIX_SCORER_URL"),
            embedding_url: non_empty("VMIX_EMBEDDING_URL"),
            timeout: Duration::from_secs(
                std::env::var("VMIX_ML_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}
