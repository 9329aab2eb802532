//! Crossfaded concatenation of ordered clips.
//!
//! Every input is letterboxed onto the first clip's frame size and frame
//! rate, then the inputs are chained pairwise with `xfade=transition=fadeblack`.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner, MIN_VIDEO_OUTPUT_BYTES};
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::probe::{probe_duration, probe_video};

/// Default crossfade between clips.
pub const DEFAULT_CROSSFADE_SECS: f64 = 0.4;

/// Encoding settings for the merged clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatConfig {
    pub crossfade_secs: f64,
    pub preset: String,
    pub crf: u8,
    pub pix_fmt: String,
    /// Outputs smaller than this are treated as failed runs
    pub min_output_bytes: u64,
    pub timeout_secs: Option<u64>,
}

impl Default for ConcatConfig {
    fn default() -> Self {
        Self {
            crossfade_secs: DEFAULT_CROSSFADE_SECS,
            preset: "veryfast".to_string(),
            crf: 20,
            pix_fmt: "yuv420p".to_string(),
            min_output_bytes: MIN_VIDEO_OUTPUT_BYTES,
            timeout_secs: None,
        }
    }
}

impl ConcatConfig {
    pub fn with_crossfade(mut self, secs: f64) -> Self {
        self.crossfade_secs = secs.max(0.0);
        self
    }
}

/// Canonical frame geometry every input is normalised to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Build the `-filter_complex` graph and the label of its final output.
///
/// `durations` holds one entry per input, in order.
pub fn build_xfade_filter(canvas: &CanvasSpec, durations: &[f64], crossfade: f64) -> (String, String) {
    let CanvasSpec { width, height, fps } = *canvas;

    let mut filters: Vec<String> = (0..durations.len())
        .map(|i| {
            format!(
                "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
                 pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,\
                 fps={fps},setsar=1,setpts=PTS-STARTPTS[v{i}]",
                i = i,
                w = width,
                h = height,
                fps = fps
            )
        })
        .collect();

    let mut last = "v0".to_string();
    let mut offset = durations.first().copied().unwrap_or(0.0);
    for (i, duration) in durations.iter().enumerate().skip(1) {
        offset -= crossfade;
        filters.push(format!(
            "[{last}][v{i}]xfade=transition=fadeblack:duration={t:.3}:offset={off:.3}[v{i}x]",
            last = last,
            i = i,
            t = crossfade,
            off = offset
        ));
        last = format!("v{}x", i);
        offset += duration;
    }

    (filters.join(";"), last)
}

/// Length of the merged clip: every join overlaps by one crossfade.
pub fn expected_duration(durations: &[f64], crossfade: f64) -> f64 {
    let joins = durations.len().saturating_sub(1) as f64;
    durations.iter().sum::<f64>() - joins * crossfade
}

/// Joins clips with fade-through-black transitions.
#[derive(Debug, Clone, Default)]
pub struct SegmentConcatenator {
    config: ConcatConfig,
}

impl SegmentConcatenator {
    pub fn new(config: ConcatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConcatConfig {
        &self.config
    }

    /// Merge `paths` into `output`.
    ///
    /// Fewer than two inputs are returned unchanged (an empty path when
    /// there are none) without invoking FFmpeg.
    pub async fn concatenate(&self, paths: &[PathBuf], output: &Path) -> MediaResult<PathBuf> {
        if paths.len() < 2 {
            return Ok(paths.first().cloned().unwrap_or_default());
        }

        let result = self.run(paths, output).await;
        metrics::record_concat(paths.len(), result.is_ok());
        if let Err(e) = &result {
            if e.is_external_process() {
                metrics::record_ffmpeg_failure("concat");
            }
        }
        result
    }

    async fn run(&self, paths: &[PathBuf], output: &Path) -> MediaResult<PathBuf> {
        let first = &paths[0];
        let base = probe_video(first).await.map_err(|e| MediaError::FfprobeFailed {
            message: format!("failed to read video params for {}: {}", first.display(), e),
            stderr: e.diagnostics(),
        })?;
        let canvas = CanvasSpec {
            width: base.width,
            height: base.height,
            fps: base.fps,
        };

        let mut durations = Vec::with_capacity(paths.len());
        for path in paths {
            let duration = probe_duration(path).await.map_err(|e| MediaError::FfprobeFailed {
                message: format!("failed to read duration for {}: {}", path.display(), e),
                stderr: e.diagnostics(),
            })?;
            durations.push(duration);
        }

        let crossfade = self.config.crossfade_secs;
        let (filter, last) = build_xfade_filter(&canvas, &durations, crossfade);
        debug!(filter = %filter, "Concat filter graph");

        let cmd = FfmpegCommand::with_inputs(paths, output)
            .filter_complex(filter)
            .map(format!("[{}]", last))
            .no_audio()
            .video_codec("libx264")
            .preset(self.config.preset.clone())
            .crf(self.config.crf)
            .pix_fmt(self.config.pix_fmt.clone());

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.config.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        let merged = runner
            .run_expecting_output(&cmd, self.config.min_output_bytes)
            .await?;

        info!(
            inputs = paths.len(),
            output = %merged.display(),
            expected_duration = expected_duration(&durations, crossfade),
            "Concatenated clips"
        );
        Ok(merged)
    }
}

/// Merge `paths` into `output` with the default encoder settings.
pub async fn concatenate(paths: &[PathBuf], crossfade_secs: f64, output: &Path) -> MediaResult<PathBuf> {
    SegmentConcatenator::new(ConcatConfig::default().with_crossfade(crossfade_secs))
        .concatenate(paths, output)
        .await
}
