//! Phase-vocoder time stretch.
//!
//! STFT with a Hann window, magnitudes interpolated between neighbouring
//! frames at fractional steps of `rate`, phases advanced by the measured
//! per-bin frequency, then overlap-added back. Pitch is unchanged.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// STFT size used by the stretch.
pub const STRETCH_FFT_SIZE: usize = 2048;
/// STFT hop used by the stretch.
pub const STRETCH_HOP: usize = 512;

/// Periodic Hann window.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / size as f64).cos()) as f32)
        .collect()
}

/// Stretch `samples` in time by `rate` (> 1 shortens, < 1 lengthens).
///
/// The output has exactly `round(len / rate)` samples. Non-positive or
/// non-finite rates return the input unchanged.
pub fn time_stretch(samples: &[f32], rate: f64) -> Vec<f32> {
    if samples.is_empty() || !(rate > 0.0 && rate.is_finite()) {
        return samples.to_vec();
    }

    let n_fft = STRETCH_FFT_SIZE;
    let hop = STRETCH_HOP;
    let bins = n_fft / 2 + 1;
    let out_len = (samples.len() as f64 / rate).round() as usize;

    let spectrum = stft(samples, n_fft, hop);
    let n_frames = spectrum.len();

    // Expected phase advance per hop for each bin
    let phi_advance: Vec<f64> = (0..bins)
        .map(|k| 2.0 * PI * k as f64 * hop as f64 / n_fft as f64)
        .collect();

    let zero_frame = vec![Complex::new(0.0f64, 0.0); bins];

    let mut phase_acc: Vec<f64> = spectrum
        .first()
        .map(|f| f.iter().map(|c| c.arg()).collect())
        .unwrap_or_else(|| vec![0.0; bins]);

    let mut stretched = Vec::new();
    let mut step = 0.0f64;
    while step < n_frames as f64 {
        let left = step.floor() as usize;
        let alpha = step - left as f64;
        let a = spectrum.get(left).unwrap_or(&zero_frame);
        let b = spectrum.get(left + 1).unwrap_or(&zero_frame);

        let frame: Vec<Complex<f64>> = (0..bins)
            .map(|k| {
                let mag = (1.0 - alpha) * a[k].norm() + alpha * b[k].norm();
                Complex::from_polar(mag, phase_acc[k])
            })
            .collect();
        stretched.push(frame);

        for k in 0..bins {
            let dphase = b[k].arg() - a[k].arg() - phi_advance[k];
            let wrapped = dphase - 2.0 * PI * (dphase / (2.0 * PI)).round();
            phase_acc[k] += phi_advance[k] + wrapped;
        }
        step += rate;
    }

    istft(&stretched, n_fft, hop, out_len)
}

/// Centred STFT (zero padded by `n_fft / 2` on both sides), positive bins only.
fn stft(samples: &[f32], n_fft: usize, hop: usize) -> Vec<Vec<Complex<f64>>> {
    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let window = hann_window(n_fft);
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let n_frames = 1 + (padded.len() - n_fft) / hop;
    let bins = n_fft / 2 + 1;

    let mut buf = vec![Complex::new(0.0f64, 0.0); n_fft];
    (0..n_frames)
        .map(|t| {
            let pos = t * hop;
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = Complex::new(f64::from(padded[pos + i] * window[i]), 0.0);
            }
            fft.process(&mut buf);
            buf[..bins].to_vec()
        })
        .collect()
}

/// Inverse of [`stft`] with squared-window normalization, trimmed to `length`.
fn istft(frames: &[Vec<Complex<f64>>], n_fft: usize, hop: usize, length: usize) -> Vec<f32> {
    let pad = n_fft / 2;
    let total = (frames.len().saturating_sub(1)) * hop + n_fft;
    let mut output = vec![0.0f64; total.max(length + 2 * pad)];
    let mut norm = vec![0.0f64; output.len()];

    let window = hann_window(n_fft);
    let mut planner = FftPlanner::<f64>::new();
    let ifft = planner.plan_fft_inverse(n_fft);
    let mut buf = vec![Complex::new(0.0f64, 0.0); n_fft];
    let scale = 1.0 / n_fft as f64;

    for (t, frame) in frames.iter().enumerate() {
        // Rebuild the full Hermitian spectrum
        for (k, value) in frame.iter().enumerate() {
            buf[k] = *value;
        }
        for k in 1..n_fft / 2 {
            buf[n_fft - k] = frame[k].conj();
        }
        ifft.process(&mut buf);

        let pos = t * hop;
        for i in 0..n_fft {
            let w = f64::from(window[i]);
            output[pos + i] += buf[i].re * scale * w;
            norm[pos + i] += w * w;
        }
    }

    output
        .iter()
        .zip(norm.iter())
        .skip(pad)
        .take(length)
        .map(|(y, n)| if *n > 1e-10 { (y / n) as f32 } else { 0.0 })
        .collect()
}
