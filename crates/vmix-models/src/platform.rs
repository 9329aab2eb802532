//! Platform profiles and the per-run report.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::remix::RemixDebug;

/// Delivery constraints of one short-form platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlatformProfile {
    /// Aspect ratio, e.g. "9:16"
    #[serde(default = "default_ratio")]
    pub ratio: String,

    /// Accepted clip duration range in seconds, `[min, max]`
    #[serde(default = "default_duration")]
    pub duration: [u32; 2],
}

fn default_ratio() -> String {
    "9:16".to_string()
}

fn default_duration() -> [u32; 2] {
    [15, 20]
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self {
            ratio: default_ratio(),
            duration: default_duration(),
        }
    }
}

impl PlatformProfile {
    /// Clips are cut to the upper end of the accepted range.
    pub fn target_duration_secs(&self) -> f64 {
        f64::from(self.duration[1].max(self.duration[0]))
    }

    /// Generation aspect: anything other than portrait is requested as landscape.
    pub fn generation_aspect(&self) -> &'static str {
        if self.ratio == "9:16" {
            "9:16"
        } else {
            "16:9"
        }
    }
}

/// Result recorded for one platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlatformResult {
    pub best_video: Option<PathBuf>,
    pub best_score: Option<f64>,
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<RemixDebug>,
    /// Set when the platform failed; other platforms still run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Audit report written at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub platforms: BTreeMap<String, PlatformResult>,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            generated_at: Utc::now(),
            platforms: BTreeMap::new(),
        }
    }

    pub fn failed_platforms(&self) -> impl Iterator<Item = &str> {
        self.platforms
            .iter()
            .filter(|(_, r)| r.error.is_some())
            .map(|(name, _)| name.as_str())
    }
}
