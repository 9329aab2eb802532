//! Generated video candidates and the generation task manifest.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Variant root used when a candidate carries neither a root nor a variant.
pub const DEFAULT_VARIANT_ROOT: &str = "V1";

/// One generated (or supplied) video that may be selected.
///
/// `path` is where the file was planned to land; `final_path` is where the
/// generator actually delivered it, which can differ and can appear later
/// than the candidate itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoCandidate {
    /// Planned output location
    #[serde(default)]
    pub path: PathBuf,

    /// Delivered file location
    #[serde(default)]
    pub final_path: Option<PathBuf>,

    /// Variant identifier (e.g. "V2" or "V2_S1")
    #[serde(default)]
    pub variant: String,

    /// Groups segments belonging to one creative variant
    #[serde(default)]
    pub variant_root: Option<String>,

    #[serde(default)]
    pub segment_index: Option<u32>,

    #[serde(default)]
    pub segment_total: Option<u32>,

    /// Generation prompt
    #[serde(default)]
    pub prompt: String,

    /// External generation task identifier
    #[serde(default, rename = "taskId", alias = "task_id")]
    pub task_id: Option<String>,
}

impl VideoCandidate {
    /// Candidate backed by an existing file.
    pub fn from_path(path: impl Into<PathBuf>, variant: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            final_path: None,
            variant: variant.into(),
            variant_root: None,
            segment_index: None,
            segment_total: None,
            prompt: String::new(),
            task_id: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_final_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.final_path = Some(path.into());
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_segment(mut self, root: impl Into<String>, index: u32, total: u32) -> Self {
        self.variant_root = Some(root.into());
        self.segment_index = Some(index);
        self.segment_total = Some(total);
        self
    }

    /// Group key: `variant_root`, else `variant`, else `V1`.
    pub fn root(&self) -> &str {
        self.variant_root
            .as_deref()
            .filter(|r| !r.is_empty())
            .or_else(|| Some(self.variant.as_str()).filter(|v| !v.is_empty()))
            .unwrap_or(DEFAULT_VARIANT_ROOT)
    }

    /// Ordering key inside a variant group.
    pub fn segment_order(&self) -> u32 {
        self.segment_index.unwrap_or(0)
    }

    /// Non-empty task identifier.
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref().filter(|t| !t.is_empty())
    }
}

/// One entry of the generation manifest (`tasks.json`).
///
/// The manifest lets a later run resume from generation requests issued by
/// an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationTask {
    pub platform: String,
    /// 1-based position in the request batch
    #[serde(default)]
    pub i: u32,
    #[serde(default)]
    pub variant: String,
    #[serde(default)]
    pub variant_root: Option<String>,
    #[serde(default)]
    pub segment_index: Option<u32>,
    #[serde(default)]
    pub segment_total: Option<u32>,
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub reference_images: Vec<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    /// Where the delivered file is expected
    #[serde(default)]
    pub save_as: PathBuf,
    /// Planned output name
    #[serde(default)]
    pub planned_out: PathBuf,
}

impl GenerationTask {
    /// Convert a manifest entry into a selectable candidate.
    pub fn to_candidate(&self) -> VideoCandidate {
        VideoCandidate {
            path: self.planned_out.clone(),
            final_path: Some(self.save_as.clone()).filter(|p| !p.as_os_str().is_empty()),
            variant: self.variant.clone(),
            variant_root: self.variant_root.clone(),
            segment_index: self.segment_index,
            segment_total: self.segment_total,
            prompt: self.prompt.clone(),
            task_id: Some(self.task_id.clone()).filter(|t| !t.is_empty()),
        }
    }
}
