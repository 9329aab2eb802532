//! Secondary loop overlay.

use super::buffer::AudioBuffer;
use super::shaping::db_to_gain;

/// Tile `loop_buffer` to the length of `primary` and mix it in at `mix_db`.
///
/// The loop must already be at the primary's sample rate. An empty loop
/// leaves the primary unchanged. The output always has the primary's length.
pub fn overlay_loop(primary: &AudioBuffer, loop_buffer: &AudioBuffer, mix_db: f32) -> AudioBuffer {
    if loop_buffer.is_empty() {
        return primary.clone();
    }

    let mix = db_to_gain(mix_db);
    let samples = primary
        .samples()
        .iter()
        .zip(loop_buffer.samples().iter().cycle())
        .map(|(p, l)| p + mix * l)
        .collect();
    primary.with_samples(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_is_tiled_to_primary_length() {
        let primary = AudioBuffer::new(vec![0.0; 7], 100);
        let beat = AudioBuffer::new(vec![1.0, 0.0, -1.0], 100);
        let out = overlay_loop(&primary, &beat, 0.0);
        assert_eq!(out.samples(), &[1.0, 0.0, -1.0, 1.0, 0.0, -1.0, 1.0]);
    }

    #[test]
    fn test_long_loop_is_truncated_and_scaled() {
        let primary = AudioBuffer::new(vec![0.5, 0.5], 100);
        let beat = AudioBuffer::new(vec![1.0; 10], 100);
        let out = overlay_loop(&primary, &beat, -20.0);
        assert_eq!(out.len(), 2);
        assert!((out.samples()[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_overlay_then_limit_stays_bounded() {
        use crate::remix::limiter::limit;

        for (primary_len, loop_len) in [(5usize, 64usize), (64, 5), (1, 1_000), (300, 301)] {
            let primary = AudioBuffer::new(
                (0..primary_len).map(|i| ((i as f32) * 0.7).sin()).collect(),
                22_050,
            );
            let beat = AudioBuffer::new(
                (0..loop_len).map(|i| if i % 2 == 0 { 1e6 } else { -1e6 }).collect(),
                22_050,
            );
            let mixed = overlay_loop(&primary, &beat, -6.0);
            assert_eq!(mixed.len(), primary_len);

            let out = limit(&mixed, 0.98);
            assert!(out.samples().iter().all(|s| s.is_finite() && s.abs() <= 0.98));
        }
    }

    #[test]
    fn test_empty_loop_is_noop() {
        let primary = AudioBuffer::new(vec![0.1, 0.2], 100);
        let out = overlay_loop(&primary, &AudioBuffer::new(Vec::new(), 100), -10.0);
        assert_eq!(out, primary);
    }
}
