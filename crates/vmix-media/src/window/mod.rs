//! Video window selection.
//!
//! Picks the start offset of the most active `target`-second stretch of a
//! video. Activity is the grayscale frame difference between consecutive
//! sampled frames plus a weighted count of face-positive frames, binned per
//! second.

pub mod faces;
pub mod frames;
pub mod scorer;

pub use faces::{face_detector, find_cascade_path, FacePresence, NoFaceDetector};
pub use frames::{scan_gray_frames, FrameSampling, GrayFrame};
pub use scorer::{ActivityBins, WindowScoringConfig};

#[cfg(feature = "opencv")]
pub use faces::HaarFaceDetector;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use vmix_models::Capability;

use crate::error::MediaResult;
use crate::metrics;
use crate::probe::probe_video;

/// Selects the most active window of a video.
#[derive(Debug, Clone, Default)]
pub struct VideoWindowSelector {
    config: WindowScoringConfig,
    cascade_path: Option<PathBuf>,
}

impl VideoWindowSelector {
    pub fn new(config: WindowScoringConfig) -> Self {
        Self {
            config,
            cascade_path: None,
        }
    }

    /// Use a specific Haar cascade file before the default locations.
    pub fn with_cascade_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cascade_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &WindowScoringConfig {
        &self.config
    }

    /// Start offset (whole seconds) of the best window of `target_secs`.
    ///
    /// Returns 0 when the target is not positive, the video is no longer
    /// than the target, or the video cannot be read.
    pub async fn select(&self, video_path: &Path, target_secs: f64) -> f64 {
        if !(target_secs > 0.0) {
            return 0.0;
        }
        if !video_path.exists() {
            warn!(path = %video_path.display(), "Video for window selection not found");
            metrics::record_window_selection(true);
            return 0.0;
        }

        let detector = face_detector(self.cascade_path.as_deref());
        match self.scan(video_path, target_secs, detector).await {
            Ok(Some(start)) => {
                metrics::record_window_selection(false);
                start
            }
            Ok(None) => 0.0,
            Err(e) => {
                warn!(
                    path = %video_path.display(),
                    error = %e,
                    "Window selection failed, using start of video"
                );
                metrics::record_window_selection(true);
                0.0
            }
        }
    }

    /// Accumulate activity bins; `None` when the video fits the target.
    async fn scan(
        &self,
        video_path: &Path,
        target_secs: f64,
        mut detector: Capability<Box<dyn FacePresence>>,
    ) -> MediaResult<Option<f64>> {
        let info = probe_video(video_path).await?;
        if info.duration <= target_secs {
            debug!(
                path = %video_path.display(),
                duration = info.duration,
                target = target_secs,
                "Video fits the target, no window needed"
            );
            return Ok(None);
        }

        if let Some(reason) = detector.reason() {
            debug!("Scoring motion only: {}", reason);
        }

        let sampling = FrameSampling {
            stride: self.config.sample_stride.max(1),
            max_width: self.config.analysis_max_width,
        };
        let mut bins = ActivityBins::for_duration(info.duration);
        let mut previous: Option<GrayFrame> = None;

        let frames = scan_gray_frames(video_path, &info, &sampling, |frame| {
            let second = frame.second();
            if let Some(diff) = previous.as_ref().and_then(|p| frame.mean_abs_diff(p)) {
                bins.add_motion(second, diff);
            }
            if let Some(faces) = detector.as_available_mut() {
                if faces.has_face(&frame) {
                    bins.add_face(second);
                }
            }
            previous = Some(frame);
        })
        .await?;

        let window = target_secs.ceil() as usize;
        let start = bins.best_window_start(window, self.config.face_weight);

        info!(
            path = %video_path.display(),
            frames,
            window_secs = window,
            start_sec = start,
            faces_enabled = detector.is_available(),
            "Selected video window"
        );
        Ok(Some(start as f64))
    }
}

/// Start offset of the best `target_secs` window using default scoring.
pub async fn select_video_window(video_path: &Path, target_secs: f64) -> f64 {
    VideoWindowSelector::default()
        .select(video_path, target_secs)
        .await
}
