//! Per-second activity bins and rolling-window scoring.

use serde::{Deserialize, Serialize};

use super::frames::DEFAULT_ANALYSIS_MAX_WIDTH;

/// Tunables for video window scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowScoringConfig {
    /// Weight of one face-positive sampled frame relative to motion
    pub face_weight: f64,
    /// Analyse every n-th decoded frame
    pub sample_stride: u32,
    /// Frames wider than this are downscaled before analysis
    pub analysis_max_width: u32,
}

impl WindowScoringConfig {
    pub const DEFAULT_FACE_WEIGHT: f64 = 50.0;
    pub const DEFAULT_SAMPLE_STRIDE: u32 = 5;

    pub fn with_face_weight(mut self, weight: f64) -> Self {
        self.face_weight = weight;
        self
    }

    pub fn with_sample_stride(mut self, stride: u32) -> Self {
        self.sample_stride = stride.max(1);
        self
    }
}

impl Default for WindowScoringConfig {
    fn default() -> Self {
        Self {
            face_weight: Self::DEFAULT_FACE_WEIGHT,
            sample_stride: Self::DEFAULT_SAMPLE_STRIDE,
            analysis_max_width: DEFAULT_ANALYSIS_MAX_WIDTH,
        }
    }
}

/// Motion and face counts accumulated per whole second of video.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityBins {
    motion: Vec<f64>,
    faces: Vec<u32>,
}

impl ActivityBins {
    /// Bins for a video of `duration_secs`; one spare bin absorbs rounding
    /// at the tail.
    pub fn for_duration(duration_secs: f64) -> Self {
        let bins = duration_secs.max(0.0) as usize + 2;
        Self {
            motion: vec![0.0; bins],
            faces: vec![0; bins],
        }
    }

    pub fn len(&self) -> usize {
        self.motion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motion.is_empty()
    }

    /// Samples past the last bin are dropped.
    pub fn add_motion(&mut self, second: usize, amount: f64) {
        if let Some(bin) = self.motion.get_mut(second) {
            *bin += amount;
        }
    }

    pub fn add_face(&mut self, second: usize) {
        if let Some(bin) = self.faces.get_mut(second) {
            *bin += 1;
        }
    }

    pub fn motion(&self) -> &[f64] {
        &self.motion
    }

    pub fn faces(&self) -> &[u32] {
        &self.faces
    }

    /// Score of the window starting at `start` spanning `window` bins,
    /// truncated at the last bin.
    pub fn window_score(&self, start: usize, window: usize, face_weight: f64) -> f64 {
        let end = (start + window).min(self.len());
        if start >= end {
            return 0.0;
        }
        let motion: f64 = self.motion[start..end].iter().sum();
        let faces: u32 = self.faces[start..end].iter().sum();
        motion + face_weight * f64::from(faces)
    }

    /// Start second of the highest-scoring window of `window_secs` seconds.
    ///
    /// Candidate starts run over `0..max(1, bins - window)`; the earliest
    /// start wins ties.
    pub fn best_window_start(&self, window_secs: usize, face_weight: f64) -> usize {
        let window = window_secs.max(1);
        let starts = self.len().saturating_sub(window).max(1);

        let mut best_start = 0;
        let mut best_score = f64::NEG_INFINITY;
        for start in 0..starts {
            let score = self.window_score(start, window, face_weight);
            if score > best_score {
                best_score = score;
                best_start = start;
            }
        }
        best_start
    }
}
