//! Generation manifest (`tasks.json`).
//!
//! Simulated runs record one task per requested clip; a later run resumes by
//! loading the tasks for its platform back as candidates.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use vmix_models::{GenerationTask, VideoCandidate};

use crate::error::{WorkerError, WorkerResult};

/// Instruction attached to every simulated task.
pub const IDENTITY_INSTRUCTION: &str =
    "Use the same character/person as in reference_images (if provided). Keep identity consistent.";

/// One clip to request from the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPrompt {
    /// Defaults to `V<i>` by position
    #[serde(default)]
    pub variant: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub variant_root: Option<String>,
    #[serde(default)]
    pub segment_index: Option<u32>,
    #[serde(default)]
    pub segment_total: Option<u32>,
}

impl VideoPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            variant: None,
            prompt: prompt.into(),
            variant_root: None,
            segment_index: None,
            segment_total: None,
        }
    }
}

/// The manifest file of one output directory.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
}

impl Manifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded tasks. A missing manifest is an error.
    pub async fn load(&self) -> WorkerResult<Vec<GenerationTask>> {
        if !self.path.exists() {
            return Err(WorkerError::manifest(format!(
                "tasks.json not found: {}",
                self.path.display()
            )));
        }
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let tasks: Vec<GenerationTask> = serde_json::from_str(&raw)
            .map_err(|e| WorkerError::manifest(format!("{}: {}", self.path.display(), e)))?;
        Ok(tasks)
    }

    pub async fn save(&self, tasks: &[GenerationTask]) -> WorkerResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(tasks)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Candidates recorded for `platform`, in manifest order.
    pub async fn candidates_for(&self, platform: &str) -> WorkerResult<Vec<VideoCandidate>> {
        let tasks = self.load().await?;
        Ok(tasks_for_platform(&tasks, platform)
            .map(GenerationTask::to_candidate)
            .collect())
    }

    /// Record simulated tasks for `platform`.
    ///
    /// Earlier tasks of the same platform are replaced; other platforms'
    /// tasks are kept so one manifest serves a multi-platform run.
    pub async fn record_simulated(
        &self,
        platform: &str,
        prompts: &[VideoPrompt],
        reference_images: &[String],
        output_dir: &Path,
    ) -> WorkerResult<Vec<GenerationTask>> {
        let generated_dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| output_dir.join("generated"));
        let new_tasks = simulate_tasks(platform, prompts, reference_images, output_dir, &generated_dir);

        let mut tasks = if self.path.exists() {
            self.load().await?
        } else {
            Vec::new()
        };
        tasks.retain(|t| t.platform != platform);
        tasks.extend(new_tasks.iter().cloned());
        self.save(&tasks).await?;

        info!(
            platform,
            tasks = new_tasks.len(),
            manifest = %self.path.display(),
            "Recorded simulated generation tasks; place clips at <generated>/<taskId>.mp4 and resume"
        );
        Ok(new_tasks)
    }
}

pub fn tasks_for_platform<'a>(
    tasks: &'a [GenerationTask],
    platform: &'a str,
) -> impl Iterator<Item = &'a GenerationTask> {
    tasks.iter().filter(move |t| t.platform == platform)
}

/// `manual_<platform>_<nn>_<10 hex chars>`.
pub fn simulated_task_id(platform: &str, index: u32) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("manual_{}_{:02}_{}", platform, index, &hex[..10])
}

/// Tasks for `prompts`, numbered from 1.
pub fn simulate_tasks(
    platform: &str,
    prompts: &[VideoPrompt],
    reference_images: &[String],
    output_dir: &Path,
    generated_dir: &Path,
) -> Vec<GenerationTask> {
    prompts
        .iter()
        .zip(1u32..)
        .map(|(p, i)| {
            let variant = p.variant.clone().unwrap_or_else(|| format!("V{}", i));
            let task_id = simulated_task_id(platform, i);
            GenerationTask {
                platform: platform.to_string(),
                i,
                variant_root: Some(p.variant_root.clone().unwrap_or_else(|| variant.clone())),
                segment_index: p.segment_index,
                segment_total: p.segment_total,
                prompt: p.prompt.clone(),
                reference_images: reference_images.to_vec(),
                instruction: Some(IDENTITY_INSTRUCTION.to_string()),
                save_as: generated_dir.join(format!("{}.mp4", task_id)),
                planned_out: output_dir.join(format!("{}_{:02}_{}.mp4", platform, i, variant)),
                task_id,
                variant,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_simulated_task_id_format() {
        let id = simulated_task_id("tiktok", 3);
        assert!(id.starts_with("manual_tiktok_03_"));
        let hex = id.trim_start_matches("manual_tiktok_03_");
        assert_eq!(hex.len(), 10);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_simulate_tasks_layout() {
        let prompts = vec![
            VideoPrompt::new("neon street"),
            VideoPrompt {
                variant: Some("V2_S1".into()),
                variant_root: Some("V2".into()),
                segment_index: Some(1),
                segment_total: Some(2),
                ..VideoPrompt::new("rooftop dance")
            },
        ];
        let tasks = simulate_tasks(
            "tiktok",
            &prompts,
            &[],
            Path::new("outputs"),
            Path::new("outputs/generated"),
        );

        assert_eq!(tasks[0].variant, "V1");
        assert_eq!(tasks[0].variant_root.as_deref(), Some("V1"));
        assert_eq!(tasks[0].planned_out, PathBuf::from("outputs/tiktok_01_V1.mp4"));
        assert_eq!(
            tasks[0].save_as,
            PathBuf::from(format!("outputs/generated/{}.mp4", tasks[0].task_id))
        );
        assert_eq!(tasks[1].i, 2);
        assert_eq!(tasks[1].planned_out, PathBuf::from("outputs/tiktok_02_V2_S1.mp4"));
        assert_eq!(tasks[1].segment_index, Some(1));
    }

    #[tokio::test]
    async fn test_record_and_resume_per_platform() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::new(dir.path().join("generated/tasks.json"));

        manifest
            .record_simulated("tiktok", &[VideoPrompt::new("a"), VideoPrompt::new("b")], &[], dir.path())
            .await
            .unwrap();
        manifest
            .record_simulated("youtube", &[VideoPrompt::new("c")], &[], dir.path())
            .await
            .unwrap();
        // re-simulating replaces only that platform's tasks
        manifest
            .record_simulated("tiktok", &[VideoPrompt::new("d")], &[], dir.path())
            .await
            .unwrap();

        let tiktok = manifest.candidates_for("tiktok").await.unwrap();
        assert_eq!(tiktok.len(), 1);
        assert_eq!(tiktok[0].prompt, "d");
        assert!(tiktok[0].final_path.as_ref().unwrap().starts_with(dir.path().join("generated")));

        let youtube = manifest.candidates_for("youtube").await.unwrap();
        assert_eq!(youtube.len(), 1);
        assert!(manifest.candidates_for("reels").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_manifest_is_error() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::new(dir.path().join("tasks.json"));
        let err = manifest.load().await.unwrap_err();
        assert!(err.to_string().contains("tasks.json not found"));
    }
}
