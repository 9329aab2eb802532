//! Mono sample buffers, decoding via FFmpeg and WAV output.

use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_parent_dir;

/// Mono f32 samples at a fixed sample rate.
///
/// Transforms never mutate their input; each stage returns a new buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A silent buffer of the given duration.
    pub fn silence(duration_secs: f64, sample_rate: u32) -> Self {
        let len = (duration_secs.max(0.0) * f64::from(sample_rate)).round() as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// New buffer at the same sample rate.
    pub fn with_samples(&self, samples: Vec<f32>) -> Self {
        Self::new(samples, self.sample_rate)
    }

    /// Copy out `[start_sec, end_sec)`, clamped to the buffer.
    pub fn crop(&self, start_sec: f64, end_sec: f64) -> Self {
        let sr = f64::from(self.sample_rate);
        let start = ((start_sec.max(0.0) * sr) as usize).min(self.samples.len());
        let end = ((end_sec.min(self.duration_secs()) * sr).max(0.0) as usize)
            .min(self.samples.len());
        if end <= start {
            return self.with_samples(Vec::new());
        }
        self.with_samples(self.samples[start..end].to_vec())
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Root mean square over the whole buffer.
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| f64::from(*s) * f64::from(*s)).sum();
        (sum / self.samples.len() as f64).sqrt() as f32
    }
}

/// Decode any audio (or the audio track of a video) to mono at `sample_rate`.
pub async fn load_audio(path: &Path, sample_rate: u32) -> MediaResult<AudioBuffer> {
    load_audio_segment(path, sample_rate, None).await
}

/// Decode at most the first `max_secs` seconds of a file to mono.
pub async fn load_audio_segment(
    path: &Path,
    sample_rate: u32,
    max_secs: Option<f64>,
) -> MediaResult<AudioBuffer> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    if sample_rate == 0 {
        return Err(MediaError::InvalidAudio("sample rate must be positive".into()));
    }

    let raw = NamedTempFile::new()?;
    let mut cmd = FfmpegCommand::new(path, raw.path());
    if let Some(secs) = max_secs {
        cmd = cmd.duration(secs);
    }
    let cmd = cmd.output_args([
        "-vn",
        "-ar",
        &sample_rate.to_string(),
        "-ac",
        "1",
        "-f",
        "f32le",
    ]);
    FfmpegRunner::new().run(&cmd).await?;

    let bytes = tokio::fs::read(raw.path()).await?;
    let samples: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    debug!(
        path = %path.display(),
        samples = samples.len(),
        sample_rate,
        "Decoded audio"
    );

    Ok(AudioBuffer::new(samples, sample_rate))
}

/// Write a buffer as 16-bit PCM mono WAV, creating parent directories.
pub async fn save_wav(buffer: &AudioBuffer, path: &Path) -> MediaResult<()> {
    ensure_parent_dir(path).await?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let samples = buffer.samples().to_vec();
    let path_buf = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> MediaResult<()> {
        let mut writer = hound::WavWriter::create(&path_buf, spec)?;
        for sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * f32::from(i16::MAX)) as i16)?;
        }
        writer.finalize()?;
        Ok(())
    })
    .await
    .map_err(|e| MediaError::internal(format!("WAV writer task failed: {}", e)))??;

    debug!(path = %path.display(), samples = buffer.len(), "Wrote WAV");
    Ok(())
}
