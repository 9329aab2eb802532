//! Audio features of the source track.

use std::path::Path;

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vmix_models::FeatureMap;

use crate::error::MediaResult;
use crate::remix::segment::{rms_envelope, RMS_FRAME_LENGTH, RMS_HOP_LENGTH};
use crate::remix::stretch::hann_window;
use crate::remix::{estimate_bpm, load_audio_segment, AudioBuffer};

/// Sample rate features are computed at.
pub const FEATURE_SAMPLE_RATE: u32 = 22_050;
/// Only the start of long tracks is analysed.
pub const FEATURE_MAX_SECS: f64 = 120.0;

/// Summary of an audio track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub bpm: f64,
    pub duration_sec: f64,
    pub rms: f64,
    pub spectral_centroid: f64,
}

impl AudioFeatures {
    /// Compute features of an in-memory buffer.
    pub fn from_buffer(buffer: &AudioBuffer) -> Self {
        let envelope = rms_envelope(buffer.samples(), RMS_FRAME_LENGTH, RMS_HOP_LENGTH);
        let rms = if envelope.is_empty() {
            0.0
        } else {
            envelope.iter().map(|v| f64::from(*v)).sum::<f64>() / envelope.len() as f64
        };

        Self {
            bpm: estimate_bpm(buffer),
            duration_sec: buffer.duration_secs(),
            rms,
            spectral_centroid: mean_spectral_centroid(buffer),
        }
    }

    pub fn to_feature_map(&self) -> FeatureMap {
        FeatureMap::from([
            ("bpm".to_string(), self.bpm),
            ("duration_sec".to_string(), self.duration_sec),
            ("rms".to_string(), self.rms),
            ("spectral_centroid".to_string(), self.spectral_centroid),
        ])
    }
}

/// Load the first two minutes of `path` and summarise them.
pub async fn extract_audio_features(path: &Path) -> MediaResult<AudioFeatures> {
    let buffer = load_audio_segment(path, FEATURE_SAMPLE_RATE, Some(FEATURE_MAX_SECS)).await?;
    let features = tokio::task::spawn_blocking(move || AudioFeatures::from_buffer(&buffer))
        .await
        .map_err(|e| crate::error::MediaError::internal(format!("feature task failed: {}", e)))?;
    debug!(path = %path.display(), ?features, "Extracted audio features");
    Ok(features)
}

/// Mean over centred STFT frames of the magnitude-weighted mean frequency.
///
/// Silent frames contribute 0.
pub fn mean_spectral_centroid(buffer: &AudioBuffer) -> f64 {
    let samples = buffer.samples();
    if samples.is_empty() || buffer.sample_rate() == 0 {
        return 0.0;
    }

    let n_fft = RMS_FRAME_LENGTH;
    let hop = RMS_HOP_LENGTH;
    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let window = hann_window(n_fft);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);
    let bins = n_fft / 2 + 1;
    let bin_hz = f64::from(buffer.sample_rate()) / n_fft as f64;
    let n_frames = 1 + (padded.len() - n_fft) / hop;

    let mut frame = vec![Complex::new(0.0f32, 0.0); n_fft];
    let mut total = 0.0f64;
    for t in 0..n_frames {
        let pos = t * hop;
        for (i, slot) in frame.iter_mut().enumerate() {
            *slot = Complex::new(padded[pos + i] * window[i], 0.0);
        }
        fft.process(&mut frame);

        let (weighted, mass) = frame[..bins]
            .iter()
            .enumerate()
            .fold((0.0f64, 0.0f64), |(w, m), (k, c)| {
                let mag = f64::from(c.norm());
                (w + k as f64 * bin_hz * mag, m + mag)
            });
        if mass > 1e-10 {
            total += weighted / mass;
        }
    }
    total / n_frames as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, secs: f64) -> AudioBuffer {
        let sr = FEATURE_SAMPLE_RATE;
        let samples = (0..(secs * f64::from(sr)) as usize)
            .map(|i| (0.5 * (2.0 * std::f64::consts::PI * freq * i as f64 / f64::from(sr)).sin()) as f32)
            .collect();
        AudioBuffer::new(samples, sr)
    }

    #[test]
    fn test_centroid_tracks_tone() {
        let centroid = mean_spectral_centroid(&tone(2_000.0, 2.0));
        assert!((centroid - 2_000.0).abs() < 150.0, "centroid {}", centroid);

        let low = mean_spectral_centroid(&tone(300.0, 2.0));
        assert!(low < centroid);
    }

    #[test]
    fn test_silence_features() {
        let features = AudioFeatures::from_buffer(&AudioBuffer::silence(3.0, FEATURE_SAMPLE_RATE));
        assert_eq!(features.rms, 0.0);
        assert_eq!(features.spectral_centroid, 0.0);
        assert_eq!(features.bpm, 120.0);
        assert!((features.duration_sec - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_feature_map_keys() {
        let map = AudioFeatures::from_buffer(&tone(440.0, 1.0)).to_feature_map();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["bpm", "duration_sec", "rms", "spectral_centroid"]);
        assert!(map["rms"] > 0.0);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = extract_audio_features(Path::new("/nonexistent/a.mp3")).await.unwrap_err();
        assert!(matches!(err, crate::error::MediaError::FileNotFound(_)));
    }
}
