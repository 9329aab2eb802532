//! End-to-end remix pass.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};
use vmix_models::{RemixDebug, RemixPlan, SegmentBounds};

use super::buffer::{load_audio, save_wav, AudioBuffer};
use super::limiter::limit;
use super::overlay::overlay_loop;
use super::segment::pick_best_segment;
use super::shaping::{shape, ShelfFilters};
use super::tempo::{estimate_bpm, normalize_tempo};
use crate::error::{MediaError, MediaResult};
use crate::metrics;

/// Output of the pure part of a remix pass.
#[derive(Debug, Clone)]
pub struct RenderedRemix {
    pub audio: AudioBuffer,
    pub segment: SegmentBounds,
    pub source_bpm: f64,
}

/// Runs remix plans against source audio and writes the adapted track.
///
/// Every output goes into the engine's output directory; reruns for the
/// same target duration overwrite the previous file.
#[derive(Debug, Clone)]
pub struct RemixEngine {
    output_dir: PathBuf,
}

impl RemixEngine {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Deterministic output path for a target duration (whole seconds).
    pub fn output_path(&self, target_duration_sec: f64) -> PathBuf {
        self.output_dir.join(format!(
            "audio_adapted_{}s.wav",
            target_duration_sec.max(0.0).trunc() as u64
        ))
    }

    /// Load, adapt and save `audio_path` according to `plan`.
    ///
    /// Fails before any processing when the source (or a configured loop)
    /// does not exist.
    pub async fn apply(
        &self,
        audio_path: &Path,
        plan: &RemixPlan,
        target_duration_sec: f64,
    ) -> MediaResult<(PathBuf, RemixDebug)> {
        if !audio_path.exists() {
            return Err(MediaError::FileNotFound(audio_path.to_path_buf()));
        }
        if let Some(loop_path) = &plan.drum_loop_path {
            if !loop_path.exists() {
                return Err(MediaError::FileNotFound(loop_path.clone()));
            }
        }
        plan.validate().map_err(MediaError::InvalidPlan)?;
        if !(target_duration_sec > 0.0 && target_duration_sec.is_finite()) {
            return Err(MediaError::InvalidPlan(format!(
                "target duration must be positive, got {}",
                target_duration_sec
            )));
        }

        let started = Instant::now();
        let source = load_audio(audio_path, plan.out_sample_rate).await?;
        if source.is_empty() {
            return Err(MediaError::InvalidAudio(format!(
                "no audio decoded from {}",
                audio_path.display()
            )));
        }

        let loop_buffer = match &plan.drum_loop_path {
            Some(loop_path) => Some(load_audio(loop_path, plan.out_sample_rate).await?),
            None => None,
        };

        let render_plan = plan.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            render(&source, loop_buffer.as_ref(), &render_plan, target_duration_sec)
        })
        .await
        .map_err(|e| MediaError::internal(format!("remix task failed: {}", e)))?;

        let out_path = self.output_path(target_duration_sec);
        save_wav(&rendered.audio, &out_path).await?;

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_remix(
            plan.effective_target_bpm().is_some(),
            plan.drum_loop_path.is_some(),
            elapsed,
        );
        info!(
            source = %audio_path.display(),
            output = %out_path.display(),
            source_bpm = rendered.source_bpm,
            start_sec = rendered.segment.start_sec,
            end_sec = rendered.segment.end_sec,
            elapsed_secs = elapsed,
            "Remix complete"
        );

        let debug_info = RemixDebug {
            source_bpm: rendered.source_bpm,
            segment: rendered.segment,
            target_bpm: plan.target_bpm,
            out_sample_rate: plan.out_sample_rate,
            out_path: out_path.clone(),
        };
        Ok((out_path, debug_info))
    }
}

/// The in-memory pipeline: select → crop → tempo → overlay → shape → limit.
///
/// `loop_buffer` must already be at the source's sample rate.
pub fn render(
    source: &AudioBuffer,
    loop_buffer: Option<&AudioBuffer>,
    plan: &RemixPlan,
    target_duration_sec: f64,
) -> RenderedRemix {
    let source_bpm = estimate_bpm(source);

    let segment = plan
        .explicit_window()
        .unwrap_or_else(|| pick_best_segment(source, target_duration_sec));
    debug!(
        start_sec = segment.start_sec,
        end_sec = segment.end_sec,
        explicit = plan.explicit_window().is_some(),
        "Selected segment"
    );

    let mut audio = source.crop(segment.start_sec, segment.end_sec);

    if plan.effective_target_bpm().is_some() {
        audio = normalize_tempo(&audio, source_bpm, plan.target_bpm, plan.max_time_stretch);
    }

    if plan.drum_loop_path.is_some() {
        if let Some(loop_buffer) = loop_buffer {
            audio = overlay_loop(&audio, loop_buffer, plan.drum_mix_db);
        }
    }

    let filters = ShelfFilters::design(audio.sample_rate());
    if let Some(reason) = filters.reason() {
        warn!("Spectral shaping skipped: {}", reason);
    }
    audio = shape(&audio, &filters, plan.bass_boost_db, plan.presence_boost_db);
    audio = limit(&audio, plan.limiter_ceiling);

    RenderedRemix {
        audio,
        segment,
        source_bpm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 22_050;

    fn noise_with_loud_tail(secs: f64) -> AudioBuffer {
        let len = (secs * f64::from(SR)) as usize;
        let loud_from = len * 3 / 4;
        let samples = (0..len)
            .map(|i| {
                let amp = if i >= loud_from { 0.8 } else { 0.05 };
                let phase = (i as f32 * 0.37).sin();
                amp * phase
            })
            .collect();
        AudioBuffer::new(samples, SR)
    }

    #[test]
    fn test_output_path_is_deterministic() {
        let engine = RemixEngine::new("/tmp/run-1");
        assert_eq!(
            engine.output_path(15.9),
            PathBuf::from("/tmp/run-1/audio_adapted_15s.wav")
        );
        assert_eq!(
            engine.output_path(20.0),
            PathBuf::from("/tmp/run-1/audio_adapted_20s.wav")
        );
    }

    #[test]
    fn test_render_picks_loud_region_and_limits() {
        let source = noise_with_loud_tail(8.0);
        let plan = RemixPlan::default();
        let out = render(&source, None, &plan, 2.0);

        assert!(out.segment.start_sec >= 5.5, "start {}", out.segment.start_sec);
        assert!((out.segment.duration() - 2.0).abs() < 1e-9);
        let cropped = source.crop(out.segment.start_sec, out.segment.end_sec);
        assert_eq!(out.audio.len(), cropped.len());
        assert!((cropped.len() as i64 - 2 * SR as i64).abs() <= 1);
        assert!(out.audio.peak() <= plan.limiter_ceiling);
    }

    #[test]
    fn test_render_explicit_window_and_stretch() {
        let source = noise_with_loud_tail(8.0);
        let plan = RemixPlan::default()
            .with_window(1.0, 3.0)
            .with_target_bpm(1_000.0);
        let out = render(&source, None, &plan, 15.0);

        assert_eq!(out.segment, SegmentBounds::new(1.0, 3.0));
        // Rate clamps at 1 + 0.12 regardless of the detected tempo
        let expected = ((2 * SR) as f64 / 1.12).round() as usize;
        assert_eq!(out.audio.len(), expected);
    }

    #[test]
    fn test_render_overlay_keeps_length() {
        let source = noise_with_loud_tail(4.0);
        let beat = AudioBuffer::new(vec![0.5; 1_000], SR);
        let plan = RemixPlan::default().with_drum_loop("loop.wav", -6.0);
        let out = render(&source, Some(&beat), &plan, 1.0);
        let cropped = source.crop(out.segment.start_sec, out.segment.end_sec);
        assert_eq!(out.audio.len(), cropped.len());
        assert!(out.audio.peak() <= plan.limiter_ceiling);
    }

    #[tokio::test]
    async fn test_apply_fails_fast_on_missing_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = RemixEngine::new(dir.path());
        let err = engine
            .apply(Path::new("/nonexistent/song.mp3"), &RemixPlan::default(), 15.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(!engine.output_path(15.0).exists());
    }

    #[tokio::test]
    async fn test_apply_fails_fast_on_missing_loop() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("song.wav");
        tokio::fs::write(&source, b"not decoded").await.unwrap();

        let plan = RemixPlan::default().with_drum_loop(dir.path().join("missing.wav"), -9.0);
        let err = RemixEngine::new(dir.path())
            .apply(&source, &plan, 15.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(p) if p.ends_with("missing.wav")));
    }
}
