//! Visual features of a candidate clip.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vmix_models::FeatureMap;

use crate::error::MediaResult;
use crate::probe::probe_video;
use crate::window::{face_detector, scan_gray_frames, FrameSampling, GrayFrame};

/// Mean frame difference above which consecutive samples count as a cut.
pub const SCENE_CHANGE_THRESHOLD: f64 = 20.0;
/// Share of face-positive samples needed for `has_faces`.
pub const FACE_RATIO_THRESHOLD: f64 = 0.05;
/// Bottom share of the frame inspected for captions.
pub const TEXT_REGION_FRACTION: f64 = 0.35;
/// Edge density marking a caption-like frame.
pub const TEXT_EDGE_DENSITY_THRESHOLD: f64 = 0.03;
/// Share of caption-like samples needed for `has_text_overlay`.
pub const TEXT_RATIO_THRESHOLD: f64 = 0.10;

/// Canny hysteresis thresholds.
const EDGE_LOW: f64 = 100.0;
const EDGE_HIGH: f64 = 200.0;

/// Visual summary of a clip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoFeatures {
    pub avg_brightness: f64,
    pub cut_rate_per_min: f64,
    pub has_faces: f64,
    pub has_text_overlay: f64,
}

impl VideoFeatures {
    pub fn to_feature_map(&self) -> FeatureMap {
        FeatureMap::from([
            ("avg_brightness".to_string(), self.avg_brightness),
            ("cut_rate_per_min".to_string(), self.cut_rate_per_min),
            ("has_faces".to_string(), self.has_faces),
            ("has_text_overlay".to_string(), self.has_text_overlay),
        ])
    }
}

/// Running counters over sampled frames.
#[derive(Debug, Default)]
struct FrameTally {
    sampled: usize,
    brightness_sum: f64,
    scene_changes: usize,
    face_hits: usize,
    text_hits: usize,
    previous: Option<GrayFrame>,
}

impl FrameTally {
    fn observe(&mut self, frame: GrayFrame, has_face: bool) {
        self.sampled += 1;
        self.brightness_sum += frame.mean();

        if let Some(diff) = self.previous.as_ref().and_then(|p| frame.mean_abs_diff(p)) {
            if diff > SCENE_CHANGE_THRESHOLD {
                self.scene_changes += 1;
            }
        }
        if has_face {
            self.face_hits += 1;
        }
        if frame.bottom_edge_density(TEXT_REGION_FRACTION, EDGE_LOW, EDGE_HIGH)
            > TEXT_EDGE_DENSITY_THRESHOLD
        {
            self.text_hits += 1;
        }
        self.previous = Some(frame);
    }

    fn finish(&self, duration_secs: f64) -> VideoFeatures {
        if self.sampled == 0 {
            return VideoFeatures::default();
        }
        let sampled = self.sampled as f64;
        let minutes = duration_secs / 60.0;
        let ratio_flag = |hits: usize, threshold: f64| {
            if hits as f64 / sampled > threshold {
                1.0
            } else {
                0.0
            }
        };

        VideoFeatures {
            avg_brightness: self.brightness_sum / sampled,
            cut_rate_per_min: if minutes > 0.0 {
                self.scene_changes as f64 / minutes
            } else {
                0.0
            },
            has_faces: ratio_flag(self.face_hits, FACE_RATIO_THRESHOLD),
            has_text_overlay: ratio_flag(self.text_hits, TEXT_RATIO_THRESHOLD),
        }
    }
}

/// Extracts [`VideoFeatures`] from clips.
#[derive(Debug, Clone, Default)]
pub struct VideoFeatureExtractor {
    sampling: FrameSampling,
    cascade_path: Option<PathBuf>,
}

impl VideoFeatureExtractor {
    pub fn new(sampling: FrameSampling) -> Self {
        Self {
            sampling,
            cascade_path: None,
        }
    }

    pub fn with_cascade_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cascade_path = Some(path.into());
        self
    }

    /// Features of `path`; an unreadable video yields all zeros.
    pub async fn extract(&self, path: &Path) -> VideoFeatures {
        match self.try_extract(path).await {
            Ok(features) => features,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Video features unavailable");
                VideoFeatures::default()
            }
        }
    }

    async fn try_extract(&self, path: &Path) -> MediaResult<VideoFeatures> {
        let info = probe_video(path).await?;
        let mut faces = face_detector(self.cascade_path.as_deref());
        let mut tally = FrameTally::default();

        scan_gray_frames(path, &info, &self.sampling, |frame| {
            let has_face = faces
                .as_available_mut()
                .map(|detector| detector.has_face(&frame))
                .unwrap_or(false);
            tally.observe(frame, has_face);
        })
        .await?;

        let features = tally.finish(info.duration);
        debug!(
            path = %path.display(),
            sampled = tally.sampled,
            ?features,
            "Extracted video features"
        );
        Ok(features)
    }
}

/// Features of `path` with default sampling.
pub async fn extract_video_features(path: &Path) -> VideoFeatures {
    VideoFeatureExtractor::default().extract(path).await
}
