//! Soft peak limiter.

use super::buffer::AudioBuffer;

/// Drive applied before the tanh saturation.
pub const SATURATION_DRIVE: f32 = 2.2;

/// Normalize to unit peak, saturate with `tanh`, then clamp to `±ceiling`.
///
/// The output peak never exceeds `ceiling`; silence stays silent.
/// Non-finite input samples are treated as silence.
pub fn limit(buffer: &AudioBuffer, ceiling: f32) -> AudioBuffer {
    let ceiling = if ceiling.is_finite() { ceiling.abs() } else { 1.0 };
    let finite = |s: f32| if s.is_finite() { s } else { 0.0 };
    let peak = buffer
        .samples()
        .iter()
        .fold(0.0f32, |acc, s| acc.max(finite(*s).abs()))
        + 1e-9;
    let samples = buffer
        .samples()
        .iter()
        .map(|s| (SATURATION_DRIVE * (finite(*s) / peak)).tanh().clamp(-ceiling, ceiling))
        .collect();
    buffer.with_samples(samples)
}
