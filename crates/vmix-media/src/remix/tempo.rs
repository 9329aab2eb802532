//! Tempo estimation and tempo normalization.
//!
//! The estimate works on a spectral-flux onset envelope: autocorrelation of
//! the envelope is weighted by a log-normal prior centred on 120 BPM and the
//! strongest lag wins. Only the first minute is analysed, at 22050 Hz.

use std::sync::Arc;

use rubato::{FftFixedIn, Resampler};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tracing::{debug, warn};

use super::buffer::AudioBuffer;
use super::stretch::{hann_window, time_stretch};
use crate::error::{MediaError, MediaResult};

/// Tempo reported when no beat signal is found.
pub const DEFAULT_BPM: f64 = 120.0;
/// Seconds of audio analysed for tempo.
pub const ANALYSIS_MAX_SECS: f64 = 60.0;
/// Sample rate used for tempo analysis.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;

const ONSET_FFT_SIZE: usize = 2048;
const ONSET_HOP: usize = 512;
const MIN_BPM: f64 = 30.0;
const MAX_BPM: f64 = 300.0;
/// Prior spread in octaves around [`DEFAULT_BPM`].
const PRIOR_STD_OCTAVES: f64 = 1.0;
/// Fewer envelope frames than this carry no usable periodicity.
const MIN_ENVELOPE_FRAMES: usize = 16;

/// Estimate the tempo of a buffer in BPM.
///
/// Returns [`DEFAULT_BPM`] when no positive tempo can be found.
pub fn estimate_bpm(buffer: &AudioBuffer) -> f64 {
    if buffer.is_empty() || buffer.sample_rate() == 0 {
        return DEFAULT_BPM;
    }

    let max_len = (ANALYSIS_MAX_SECS * f64::from(buffer.sample_rate())) as usize;
    let head = &buffer.samples()[..buffer.len().min(max_len)];

    let (analysis, sample_rate) = if buffer.sample_rate() == ANALYSIS_SAMPLE_RATE {
        (head.to_vec(), ANALYSIS_SAMPLE_RATE)
    } else {
        match resample(head, buffer.sample_rate(), ANALYSIS_SAMPLE_RATE) {
            Ok(resampled) => (resampled, ANALYSIS_SAMPLE_RATE),
            Err(e) => {
                warn!("Resampling for tempo analysis failed, using source rate: {}", e);
                (head.to_vec(), buffer.sample_rate())
            }
        }
    };

    let envelope = onset_envelope(&analysis);
    let frame_rate = f64::from(sample_rate) / ONSET_HOP as f64;
    match tempo_from_envelope(&envelope, frame_rate) {
        Some(bpm) => {
            debug!(bpm, frames = envelope.len(), "Estimated tempo");
            bpm
        }
        None => {
            debug!("No beat signal found, using default tempo");
            DEFAULT_BPM
        }
    }
}

/// Stretch rate that moves `source_bpm` toward `target_bpm`.
///
/// `None` when no target is set (or it is not positive). Otherwise the rate
/// is `target / source`, clamped to `[1 - max_stretch, 1 + max_stretch]`;
/// rates above 1 speed up.
pub fn stretch_rate(source_bpm: f64, target_bpm: Option<f64>, max_stretch: f64) -> Option<f64> {
    let target = target_bpm.filter(|t| *t > 0.0 && t.is_finite())?;
    let max_stretch = max_stretch.abs();
    let rate = target / source_bpm.max(1e-6);
    Some(rate.clamp(1.0 - max_stretch, 1.0 + max_stretch))
}

/// Time-stretch a buffer toward `target_bpm` without changing pitch.
///
/// Identity when no target is set. The output has `round(len / rate)`
/// samples.
pub fn normalize_tempo(
    buffer: &AudioBuffer,
    source_bpm: f64,
    target_bpm: Option<f64>,
    max_stretch: f64,
) -> AudioBuffer {
    match stretch_rate(source_bpm, target_bpm, max_stretch) {
        Some(rate) if (rate - 1.0).abs() > f64::EPSILON => {
            debug!(source_bpm, ?target_bpm, rate, "Normalizing tempo");
            buffer.with_samples(time_stretch(buffer.samples(), rate))
        }
        _ => buffer.clone(),
    }
}

/// Resample mono audio with an FFT resampler.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> MediaResult<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    const CHUNK: usize = 1024;
    let mut resampler = FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK, 2, 1)
        .map_err(|e| MediaError::internal(format!("resampler construction failed: {}", e)))?;

    let expected_len =
        (samples.len() as f64 * f64::from(to_rate) / f64::from(from_rate)).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected_len + delay + CHUNK);

    let mut pos = 0;
    while samples.len() - pos >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let chunk = &samples[pos..pos + needed];
        let out = resampler
            .process(&[chunk], None)
            .map_err(|e| MediaError::internal(format!("resampling failed: {}", e)))?;
        output.extend_from_slice(&out[0]);
        pos += needed;
    }

    // Remainder plus enough silence to flush the resampler delay
    let tail = &samples[pos..];
    let out = resampler
        .process_partial(Some(&[tail]), None)
        .map_err(|e| MediaError::internal(format!("resampling failed: {}", e)))?;
    output.extend_from_slice(&out[0]);
    while output.len() < expected_len + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| MediaError::internal(format!("resampling failed: {}", e)))?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    let start = delay.min(output.len());
    let end = (start + expected_len).min(output.len());
    Ok(output[start..end].to_vec())
}

/// Spectral-flux onset strength, one value per STFT frame.
fn onset_envelope(samples: &[f32]) -> Vec<f64> {
    if samples.len() < ONSET_FFT_SIZE {
        return Vec::new();
    }

    let window = hann_window(ONSET_FFT_SIZE);
    let mut planner = FftPlanner::<f32>::new();
    let fft: Arc<dyn Fft<f32>> = planner.plan_fft_forward(ONSET_FFT_SIZE);
    let bins = ONSET_FFT_SIZE / 2 + 1;
    let n_frames = (samples.len() - ONSET_FFT_SIZE) / ONSET_HOP + 1;

    let mut buf = vec![Complex::new(0.0f32, 0.0); ONSET_FFT_SIZE];
    let mut previous: Option<Vec<f64>> = None;
    let mut envelope = Vec::with_capacity(n_frames);

    for frame in 0..n_frames {
        let pos = frame * ONSET_HOP;
        for (slot, (s, w)) in buf
            .iter_mut()
            .zip(samples[pos..pos + ONSET_FFT_SIZE].iter().zip(window.iter()))
        {
            *slot = Complex::new(s * w, 0.0);
        }
        fft.process(&mut buf);

        // Log-compressed magnitude
        let current: Vec<f64> = buf[..bins]
            .iter()
            .map(|c| (1.0 + 100.0 * f64::from(c.norm())).ln())
            .collect();

        let flux = match &previous {
            Some(prev) => current
                .iter()
                .zip(prev.iter())
                .map(|(c, p)| (c - p).max(0.0))
                .sum(),
            None => 0.0,
        };
        envelope.push(flux);
        previous = Some(current);
    }

    envelope
}

/// Pick the tempo whose lag maximizes prior-weighted autocorrelation.
fn tempo_from_envelope(envelope: &[f64], frame_rate: f64) -> Option<f64> {
    if envelope.len() < MIN_ENVELOPE_FRAMES || frame_rate <= 0.0 {
        return None;
    }

    let mean = envelope.iter().sum::<f64>() / envelope.len() as f64;
    let centered: Vec<f64> = envelope.iter().map(|v| v - mean).collect();
    if centered.iter().all(|v| v.abs() < 1e-12) {
        return None;
    }

    let min_lag = ((60.0 * frame_rate / MAX_BPM).floor() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / MIN_BPM).ceil() as usize).min(centered.len() - 1);
    if max_lag <= min_lag + 1 {
        return None;
    }

    let autocorr = |lag: usize| -> f64 {
        centered
            .iter()
            .zip(centered[lag..].iter())
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / (centered.len() - lag) as f64
    };

    let weighted: Vec<f64> = (min_lag..=max_lag)
        .map(|lag| {
            let bpm = 60.0 * frame_rate / lag as f64;
            let octaves = (bpm / DEFAULT_BPM).log2() / PRIOR_STD_OCTAVES;
            autocorr(lag) * (-0.5 * octaves * octaves).exp()
        })
        .collect();

    let (best, best_value) = weighted
        .iter()
        .enumerate()
        .fold((0usize, f64::NEG_INFINITY), |(bi, bv), (i, v)| {
            if *v > bv {
                (i, *v)
            } else {
                (bi, bv)
            }
        });
    if !(best_value > 0.0) {
        return None;
    }

    // Parabolic interpolation around the peak for sub-frame lag precision
    let mut lag = (min_lag + best) as f64;
    if best > 0 && best + 1 < weighted.len() {
        let (a, b, c) = (weighted[best - 1], weighted[best], weighted[best + 1]);
        let denom = a - 2.0 * b + c;
        if denom.abs() > 1e-12 {
            let shift = 0.5 * (a - c) / denom;
            if shift.abs() <= 1.0 {
                lag += shift;
            }
        }
    }

    let bpm = 60.0 * frame_rate / lag;
    (bpm.is_finite() && bpm > 0.0).then_some(bpm)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Short decaying 1 kHz blips at a fixed tempo.
    fn click_track(bpm: f64, secs: f64, sample_rate: u32) -> AudioBuffer {
        let sr = f64::from(sample_rate);
        let mut samples = vec![0.0f32; (secs * sr) as usize];
        let period = (60.0 / bpm * sr) as usize;
        let click_len = (0.02 * sr) as usize;
        let mut start = 0;
        while start < samples.len() {
            for i in 0..click_len.min(samples.len() - start) {
                let t = i as f64 / sr;
                let decay = (-(i as f64) / (click_len as f64 / 4.0)).exp();
                samples[start + i] = (0.9 * decay * (2.0 * std::f64::consts::PI * 1000.0 * t).sin()) as f32;
            }
            start += period;
        }
        AudioBuffer::new(samples, sample_rate)
    }

    #[test]
    fn test_stretch_rate_is_clamped() {
        assert_eq!(stretch_rate(120.0, None, 0.12), None);
        assert_eq!(stretch_rate(120.0, Some(0.0), 0.12), None);
        assert_eq!(stretch_rate(120.0, Some(-5.0), 0.12), None);

        let fast = stretch_rate(100.0, Some(200.0), 0.12).unwrap();
        assert!((fast - 1.12).abs() < 1e-12);
        let slow = stretch_rate(200.0, Some(100.0), 0.12).unwrap();
        assert!((slow - 0.88).abs() < 1e-12);
        let mild = stretch_rate(120.0, Some(126.0), 0.12).unwrap();
        assert!((mild - 1.05).abs() < 1e-12);

        // Zero source tempo does not divide by zero
        let rate = stretch_rate(0.0, Some(120.0), 0.12).unwrap();
        assert!((rate - 1.12).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_without_target_is_identity() {
        let buf = click_track(120.0, 2.0, 8_000);
        assert_eq!(normalize_tempo(&buf, 120.0, None, 0.12), buf);
        assert_eq!(normalize_tempo(&buf, 120.0, Some(120.0), 0.12), buf);
    }

    #[test]
    fn test_normalize_changes_length() {
        let buf = click_track(100.0, 3.0, 8_000);
        let out = normalize_tempo(&buf, 100.0, Some(110.0), 0.12);
        let expected = (buf.len() as f64 / 1.1).round() as usize;
        assert_eq!(out.len(), expected);
        assert_eq!(out.sample_rate(), buf.sample_rate());
    }

    #[test]
    fn test_silence_gives_default_tempo() {
        let buf = AudioBuffer::silence(5.0, 22_050);
        assert_eq!(estimate_bpm(&buf), DEFAULT_BPM);
        assert_eq!(estimate_bpm(&AudioBuffer::new(Vec::new(), 44_100)), DEFAULT_BPM);
    }

    #[test]
    fn test_click_track_tempo() {
        let bpm = estimate_bpm(&click_track(120.0, 20.0, 22_050));
        assert!((bpm - 120.0).abs() < 5.0, "estimated {}", bpm);

        let bpm = estimate_bpm(&click_track(100.0, 20.0, 22_050));
        assert!((bpm - 100.0).abs() < 5.0, "estimated {}", bpm);
    }

    #[test]
    fn test_resample_length() {
        let samples = vec![0.25f32; 44_100];
        let out = resample(&samples, 44_100, 22_050).unwrap();
        assert_eq!(out.len(), 22_050);
        // Steady-state level survives
        assert!((out[11_000] - 0.25).abs() < 0.01);
    }
}
