//! Energy-based segment selection.
//!
//! Picks the most energetic window of a given duration from frame-wise RMS.

use vmix_models::SegmentBounds;

use super::buffer::AudioBuffer;

/// RMS analysis frame length in samples.
pub const RMS_FRAME_LENGTH: usize = 2048;
/// RMS analysis hop in samples.
pub const RMS_HOP_LENGTH: usize = 512;

/// Frame-wise RMS with centred frames.
///
/// Frame `t` covers samples `[t*hop - frame/2, t*hop + frame/2)`, zero
/// padded at both ends, so there are `1 + len / hop` frames.
pub fn rms_envelope(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
    let frame_length = frame_length.max(1);
    let hop_length = hop_length.max(1);
    let half = frame_length / 2;
    let n_frames = 1 + samples.len() / hop_length;

    // Prefix sums of squares for O(1) per frame
    let mut energy = Vec::with_capacity(samples.len() + 1);
    energy.push(0.0f64);
    let mut acc = 0.0f64;
    for s in samples {
        acc += f64::from(*s) * f64::from(*s);
        energy.push(acc);
    }

    (0..n_frames)
        .map(|t| {
            let center = t * hop_length;
            let lo = center.saturating_sub(half).min(samples.len());
            let hi = (center + frame_length - half).min(samples.len());
            let sum = if hi > lo { energy[hi] - energy[lo] } else { 0.0 };
            (sum.max(0.0) / frame_length as f64).sqrt() as f32
        })
        .collect()
}

/// Choose the `[start, end)` window of `duration_secs` with the highest
/// summed RMS energy.
///
/// Ties go to the earliest window. When the envelope is no longer than the
/// window the whole buffer is used from the start. A window running past the
/// end of the buffer is shifted left to end at the buffer end.
pub fn pick_best_segment(buffer: &AudioBuffer, duration_secs: f64) -> SegmentBounds {
    let buffer_secs = buffer.duration_secs();
    let sr = f64::from(buffer.sample_rate().max(1));
    let rms = rms_envelope(buffer.samples(), RMS_FRAME_LENGTH, RMS_HOP_LENGTH);

    let hop_secs = RMS_HOP_LENGTH as f64 / sr;
    let window = ((duration_secs / hop_secs).floor().max(0.0) as usize).max(1);

    if rms.len() <= window {
        return SegmentBounds::new(0.0, duration_secs.min(buffer_secs));
    }

    // Exclusive prefix sum: window starting at i sums csum[i + window] - csum[i]
    let mut csum = Vec::with_capacity(rms.len() + 1);
    csum.push(0.0f64);
    for value in &rms {
        let last = csum[csum.len() - 1];
        csum.push(last + f64::from(*value));
    }

    let mut best_index = 0usize;
    let mut best_sum = f64::NEG_INFINITY;
    for i in 0..=(rms.len() - window) {
        let sum = csum[i + window] - csum[i];
        if sum > best_sum {
            best_sum = sum;
            best_index = i;
        }
    }

    let mut start = best_index as f64 * hop_secs;
    let mut end = start + duration_secs;
    if end > buffer_secs {
        end = buffer_secs;
        start = (end - duration_secs).max(0.0);
    }
    SegmentBounds::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 8_000;

    fn buffer_with_burst(total_secs: f64, burst_start: f64, burst_secs: f64) -> AudioBuffer {
        let mut buf = AudioBuffer::silence(total_secs, SR).into_samples();
        let a = (burst_start * f64::from(SR)) as usize;
        let b = ((burst_start + burst_secs) * f64::from(SR)) as usize;
        for (i, s) in buf[a..b].iter_mut().enumerate() {
            *s = if i % 2 == 0 { 0.8 } else { -0.8 };
        }
        AudioBuffer::new(buf, SR)
    }

    #[test]
    fn test_envelope_frame_count_and_padding() {
        let samples = vec![1.0f32; 4096];
        let rms = rms_envelope(&samples, 2048, 512);
        assert_eq!(rms.len(), 1 + 4096 / 512);
        // First frame is half zero padding
        assert!((rms[0] - 0.5f32.sqrt()).abs() < 1e-6);
        // Fully inside the signal
        assert!((rms[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_short_buffer_uses_whole_buffer() {
        let buf = AudioBuffer::silence(2.0, SR);
        let seg = pick_best_segment(&buf, 10.0);
        assert_eq!(seg.start_sec, 0.0);
        assert!((seg.end_sec - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_finds_energetic_region() {
        let buf = buffer_with_burst(10.0, 6.0, 1.0);
        let seg = pick_best_segment(&buf, 1.0);
        assert!((seg.start_sec - 6.0).abs() < 0.15, "start was {}", seg.start_sec);
        assert!((seg.duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ties_go_to_earliest_window() {
        let buf = AudioBuffer::silence(10.0, SR);
        let seg = pick_best_segment(&buf, 2.0);
        assert_eq!(seg.start_sec, 0.0);
        assert!((seg.end_sec - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_shifted_to_buffer_end() {
        // Burst at the very end: the best window starts inside the last second
        // and would overrun, so it is pulled back to end exactly at the end.
        let buf = buffer_with_burst(6.0, 5.5, 0.5);
        let seg = pick_best_segment(&buf, 2.0);
        assert!((seg.end_sec - 6.0).abs() < 1e-9);
        assert!((seg.start_sec - 4.0).abs() < 1e-9);
    }
}
