//! Per-platform adaptation runs.
//!
//! For every platform in a [`RunRequest`]: remix the audio to the platform
//! length, gather candidates (source trim, provided clips, or a resumed
//! manifest), stitch segment groups, select the best candidate and mux the
//! adapted audio onto it. Each platform's outcome lands in the
//! [`RunReport`]; one platform failing does not stop the others.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};
use uuid::Uuid;
use vmix_media::{
    concat::ConcatConfig, extract_audio_features, merge_video_audio, probe_duration,
    trim_to_best_window, RemixEngine, SegmentConcatenator, VideoFeatureExtractor,
    VideoWindowSelector, WindowScoringConfig,
};
use vmix_ml_client::{virality_oracle, MlClientConfig, SemanticRelevance, TextFeatures};
use vmix_models::{
    FeatureMap, PlatformProfile, PlatformResult, RemixDebug, RemixPreset, RunReport, ScoreContext,
    VideoCandidate,
};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::grouping::{collect_concat_paths, concat_groups, group_by_root};
use crate::locate::{with_resolved_path, CandidateLocator};
use crate::logging::JobLogger;
use crate::manifest::{Manifest, VideoPrompt};
use crate::metrics;
use crate::selection::{CandidateFeatureSource, CandidateSelector, VideoFeatureSource};

/// Tempo assumed when the source track cannot be analysed.
pub const FALLBACK_SOURCE_BPM: f64 = 120.0;

/// Platforms whose default remix follows the mood instead of a fixed style.
const SHORT_FORM_PLATFORMS: &[&str] = &["tiktok", "instagram", "youtube_short"];

/// Where a platform's candidates come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CandidateMode {
    /// Trim the source video to its best window; nothing is scored
    #[default]
    SourceOnly,
    /// Record generation tasks in the manifest and stop
    Simulate {
        #[serde(default)]
        prompts: Vec<VideoPrompt>,
    },
    /// Load the platform's tasks from the manifest
    Resume {
        /// Poll for late deliveries before selecting
        #[serde(default)]
        wait: bool,
    },
    /// Clips supplied directly in the request
    Provided {
        #[serde(default)]
        videos: Vec<VideoCandidate>,
    },
}

/// One adaptation run, usually read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub audio: Option<PathBuf>,
    #[serde(default)]
    pub source_video: Option<PathBuf>,
    #[serde(default)]
    pub lyrics_or_description: String,
    #[serde(default = "default_mood")]
    pub mood: String,
    #[serde(default)]
    pub caption_seed: Option<String>,
    /// Remix style; chosen from the platform and mood when absent
    #[serde(default)]
    pub audio_style: Option<RemixPreset>,
    #[serde(default)]
    pub drum_loop: Option<PathBuf>,
    /// Remix the audio and mux it onto the selected clip
    #[serde(default)]
    pub remix: bool,
    #[serde(default)]
    pub candidates: CandidateMode,
    /// Stitch every segment in order into one clip per platform
    #[serde(default)]
    pub concat_segments: bool,
    #[serde(default)]
    pub reference_images: Vec<String>,
    pub platforms: BTreeMap<String, PlatformProfile>,
}

fn default_mood() -> String {
    "hype".to_string()
}

impl RunRequest {
    pub async fn from_file(path: &Path) -> WorkerResult<Self> {
        if !path.exists() {
            return Err(WorkerError::InputNotFound(path.to_path_buf()));
        }
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Reject requests that cannot run before any processing starts.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.platforms.is_empty() {
            return Err(WorkerError::invalid_request("no platforms requested"));
        }
        if self.remix && self.audio.is_none() {
            return Err(WorkerError::invalid_request("remix requested without an audio track"));
        }
        for path in [&self.audio, &self.source_video, &self.drum_loop]
            .into_iter()
            .flatten()
        {
            if !path.exists() {
                return Err(WorkerError::InputNotFound(path.clone()));
            }
        }
        if matches!(self.candidates, CandidateMode::SourceOnly) && self.source_video.is_none() {
            return Err(WorkerError::invalid_request(
                "source_only mode needs a source_video",
            ));
        }
        Ok(())
    }
}

/// Default remix style for a platform.
///
/// Short-form platforms get an energetic edit for upbeat moods and a mellow
/// one otherwise; everything else gets the cinematic treatment.
pub fn default_preset(platform: &str, mood: &str) -> RemixPreset {
    let platform = platform.to_lowercase();
    if SHORT_FORM_PLATFORMS.contains(&platform.as_str()) {
        match mood.to_lowercase().as_str() {
            "hype" | "happy" => RemixPreset::JedagJedug,
            _ => RemixPreset::MellowRainy,
        }
    } else {
        RemixPreset::CinematicEpic
    }
}

/// Runs requests against one output directory.
#[derive(Debug)]
pub struct Pipeline {
    config: WorkerConfig,
    selector: CandidateSelector,
    window: VideoWindowSelector,
    concatenator: SegmentConcatenator,
    video_features: VideoFeatureExtractor,
    manifest: Manifest,
}

impl Pipeline {
    pub fn new(config: WorkerConfig, selector: CandidateSelector) -> Self {
        let mut window = VideoWindowSelector::new(WindowScoringConfig::default());
        let mut video_features = VideoFeatureExtractor::default();
        if let Some(cascade) = &config.face_cascade {
            window = window.with_cascade_path(cascade);
            video_features = video_features.with_cascade_path(cascade);
        }
        let concatenator =
            SegmentConcatenator::new(ConcatConfig::default().with_crossfade(config.crossfade_secs));
        let manifest = Manifest::new(config.manifest_path());

        Self {
            config,
            selector,
            window,
            concatenator,
            video_features,
            manifest,
        }
    }

    /// Pipeline wired to the configured ML services.
    pub fn from_config(config: WorkerConfig, ml: &MlClientConfig) -> WorkerResult<Self> {
        let oracle = virality_oracle(ml)?;
        let relevance = SemanticRelevance::from_config(ml)?;
        let mut extractor = VideoFeatureExtractor::default();
        if let Some(cascade) = &config.face_cascade {
            extractor = extractor.with_cascade_path(cascade);
        }
        let features: Arc<dyn CandidateFeatureSource> = Arc::new(VideoFeatureSource::new(extractor));

        let selector = CandidateSelector::new(
            oracle,
            relevance,
            features,
            config.deny_list(),
            CandidateLocator::from_config(&config),
        );
        Ok(Self::new(config, selector))
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run every platform and collect the report.
    ///
    /// Only request validation fails the whole run; platform failures are
    /// recorded in their report entry.
    pub async fn run(&self, request: &RunRequest) -> WorkerResult<RunReport> {
        request.validate()?;
        tokio::fs::create_dir_all(self.config.generated_dir()).await?;

        let run_id = Uuid::new_v4().to_string();
        let mut report = RunReport::new(run_id.clone());
        let base_features = self.base_features(request).await;
        info!(
            run_id = %run_id,
            platforms = request.platforms.len(),
            features = base_features.len(),
            "Starting adaptation run"
        );

        for (platform, profile) in &request.platforms {
            let logger = JobLogger::new(&run_id, platform);
            let span = logger.create_span();
            logger.log_start(&format!(
                "ratio={} duration={:?}",
                profile.ratio, profile.duration
            ));

            let outcome = self
                .run_platform(&logger, platform, profile, request, &base_features)
                .instrument(span)
                .await;

            let result = match outcome {
                Ok(result) => {
                    logger.log_completion(&match &result.best_video {
                        Some(video) => format!("best video {}", video.display()),
                        None => "no video selected".to_string(),
                    });
                    metrics::record_platform_run(platform, true);
                    result
                }
                Err(e) => {
                    if e.is_pending() {
                        logger.log_warning(&e.to_string());
                    } else {
                        logger.log_error(&e.to_string());
                    }
                    metrics::record_platform_run(platform, false);
                    PlatformResult {
                        caption: request.caption_seed.clone(),
                        error: Some(e.to_string()),
                        ..Default::default()
                    }
                }
            };
            report.platforms.insert(platform.clone(), result);
        }

        Ok(report)
    }

    /// Write the report as pretty JSON; returns its path.
    pub async fn write_report(&self, report: &RunReport) -> WorkerResult<PathBuf> {
        let path = self.config.report_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, serde_json::to_string_pretty(report)?).await?;
        info!(path = %path.display(), "Run report written");
        Ok(path)
    }

    /// Features shared by every candidate: audio, caption text and source video.
    pub async fn base_features(&self, request: &RunRequest) -> FeatureMap {
        let mut features = FeatureMap::new();

        let audio = match &request.audio {
            Some(path) => match extract_audio_features(path).await {
                Ok(f) => Some(f),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Audio features unavailable");
                    None
                }
            },
            None => None,
        };
        match audio {
            Some(f) => features.extend(f.to_feature_map()),
            None => {
                features.insert("bpm".to_string(), FALLBACK_SOURCE_BPM);
                for key in ["duration_sec", "rms", "spectral_centroid"] {
                    features.insert(key.to_string(), 0.0);
                }
            }
        }

        let text = format!(
            "{} {}",
            request.caption_seed.as_deref().unwrap_or_default(),
            request.lyrics_or_description
        );
        features.extend(TextFeatures::extract(&text).to_feature_map());

        if let Some(video) = &request.source_video {
            features.extend(self.video_features.extract(video).await.to_feature_map());
        }
        features
    }

    async fn run_platform(
        &self,
        logger: &JobLogger,
        platform: &str,
        profile: &PlatformProfile,
        request: &RunRequest,
        base_features: &FeatureMap,
    ) -> WorkerResult<PlatformResult> {
        let target = profile.target_duration_secs();
        let preset = request
            .audio_style
            .unwrap_or_else(|| default_preset(platform, &request.mood));

        let audio = if request.remix {
            Some(self.remix_audio(logger, platform, preset, target, request, base_features).await?)
        } else {
            None
        };

        let mut result = PlatformResult {
            caption: request.caption_seed.clone(),
            audio: audio.as_ref().map(|(_, debug)| debug.clone()),
            ..Default::default()
        };

        let (best_video, best_score) = match &request.candidates {
            CandidateMode::SourceOnly => (self.trim_source(logger, platform, target, request).await?, None),
            CandidateMode::Simulate { prompts } => {
                let tasks = self
                    .manifest
                    .record_simulated(platform, prompts, &request.reference_images, &self.config.output_dir)
                    .await?;
                logger.log_progress(&format!(
                    "{} generation tasks recorded in {}; deliver <taskId>.mp4 files and resume",
                    tasks.len(),
                    self.manifest.path().display()
                ));
                return Ok(result);
            }
            CandidateMode::Resume { wait } => {
                let candidates = self.manifest.candidates_for(platform).await?;
                let candidates = if *wait {
                    self.await_deliveries(candidates).await
                } else {
                    candidates
                };
                self.select(logger, platform, profile, request, candidates, base_features, !*wait)
                    .await?
            }
            CandidateMode::Provided { videos } => {
                self.select(logger, platform, profile, request, videos.clone(), base_features, false)
                    .await?
            }
        };

        let final_video = match &audio {
            Some((audio_path, _)) => {
                logger.log_progress("Muxing adapted audio");
                merge_video_audio(&best_video, audio_path).await?
            }
            None => best_video,
        };

        result.best_video = Some(final_video);
        result.best_score = best_score;
        Ok(result)
    }

    async fn remix_audio(
        &self,
        logger: &JobLogger,
        platform: &str,
        preset: RemixPreset,
        target: f64,
        request: &RunRequest,
        base_features: &FeatureMap,
    ) -> WorkerResult<(PathBuf, RemixDebug)> {
        let audio = request
            .audio
            .as_deref()
            .ok_or_else(|| WorkerError::invalid_request("remix requested without an audio track"))?;
        let source_bpm = base_features
            .get("bpm")
            .copied()
            .filter(|bpm| *bpm > 0.0)
            .unwrap_or(FALLBACK_SOURCE_BPM);
        let drum_loop = request
            .drum_loop
            .clone()
            .filter(|_| preset.uses_drum_loop());

        logger.log_progress(&format!("Remixing audio with preset {}", preset));
        let engine = RemixEngine::new(self.config.output_dir.join("audio").join(platform));
        let plan = preset.plan(source_bpm, drum_loop);
        Ok(engine.apply(audio, &plan, target).await?)
    }

    /// Source video cut to the platform length; shorter sources are used whole.
    async fn trim_source(
        &self,
        logger: &JobLogger,
        platform: &str,
        target: f64,
        request: &RunRequest,
    ) -> WorkerResult<PathBuf> {
        let source = request
            .source_video
            .as_deref()
            .ok_or_else(|| WorkerError::invalid_request("source_only mode needs a source_video"))?;

        let duration = probe_duration(source).await?;
        if duration <= target {
            logger.log_progress("Source already fits the platform length");
            return Ok(source.to_path_buf());
        }

        let out = self
            .config
            .output_dir
            .join("trimmed")
            .join(format!("{}_best.mp4", platform));
        logger.log_progress(&format!("Trimming {:.1}s source to {:.0}s", duration, target));
        Ok(trim_to_best_window(&self.window, source, target, &out).await?)
    }

    /// Wait for each candidate and pin it to where it was delivered.
    async fn await_deliveries(&self, candidates: Vec<VideoCandidate>) -> Vec<VideoCandidate> {
        let locator = self.selector.locator();
        let mut delivered = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match locator.wait_for(&candidate).await {
                Some(path) => delivered.push(with_resolved_path(&candidate, &path)),
                None => delivered.push(candidate),
            }
        }
        delivered
    }

    /// Stitch, score and pick; exhaustion maps to a pending or final error.
    #[allow(clippy::too_many_arguments)]
    async fn select(
        &self,
        logger: &JobLogger,
        platform: &str,
        profile: &PlatformProfile,
        request: &RunRequest,
        candidates: Vec<VideoCandidate>,
        base_features: &FeatureMap,
        may_still_arrive: bool,
    ) -> WorkerResult<(PathBuf, Option<f64>)> {
        let target = profile.target_duration_secs();
        let generated = self.config.generated_dir();
        tokio::fs::create_dir_all(&generated).await?;

        let candidates = if request.concat_segments {
            self.concat_all(logger, platform, target, candidates, &generated)
                .await?
        } else {
            let groups = group_by_root(&candidates);
            concat_groups(&groups, self.selector.locator(), &self.concatenator, &generated).await?
        };

        let context = ScoreContext::new(
            base_features.clone(),
            ScoreContext::compose_target_text(
                platform,
                &request.mood,
                request.caption_seed.as_deref(),
                request.audio_style.map(|p| p.as_str()),
                &request.lyrics_or_description,
            ),
        );

        let selection = self.selector.select_best_candidate(&candidates, &context).await;
        match selection.path {
            Some(path) => {
                logger.log_progress(&format!(
                    "Selected {} (score {:.2}) from {} candidates",
                    path.display(),
                    selection.score,
                    selection.scored
                ));
                Ok((path, Some(selection.score)))
            }
            None if may_still_arrive => Err(WorkerError::CandidatesPending {
                platform: platform.to_string(),
                directory: generated,
            }),
            None => Err(WorkerError::NoCandidates {
                platform: platform.to_string(),
                directory: generated,
            }),
        }
    }

    /// Every materialized segment in order, stitched into one clip.
    async fn concat_all(
        &self,
        logger: &JobLogger,
        platform: &str,
        target: f64,
        mut candidates: Vec<VideoCandidate>,
        generated: &Path,
    ) -> WorkerResult<Vec<VideoCandidate>> {
        candidates.sort_by_key(VideoCandidate::segment_order);
        let locator = self.selector.locator();
        let mut existing: Vec<PathBuf> = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            if let Some(path) = locator.resolve_existing(candidate).await {
                existing.push(path);
            }
        }

        let ordered = collect_concat_paths(&existing, target, self.config.crossfade_secs).await;
        if ordered.len() < 2 {
            return Ok(candidates);
        }

        let out = generated.join(format!("{}_all_concat.mp4", platform));
        let merged = self.concatenator.concatenate(&ordered, &out).await?;
        logger.log_progress(&format!(
            "Merged {} segments into {}",
            ordered.len(),
            merged.display()
        ));
        Ok(vec![
            VideoCandidate::from_path(merged, "all_concat").with_prompt("Concatenated all segments")
        ])
    }
}
