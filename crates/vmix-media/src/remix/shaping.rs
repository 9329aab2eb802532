//! Spectral shaping: bass and presence emphasis.
//!
//! Each band is isolated with second-order Butterworth sections and mixed
//! back in parallel: `y += (gain - 1) * band(y)`. Bass is applied first and
//! the presence band is extracted from the bass-boosted signal.

use vmix_models::Capability;

use super::buffer::AudioBuffer;

/// Low-pass corner of the bass band.
pub const BASS_CUTOFF_HZ: f64 = 120.0;
/// Lower edge of the presence band.
pub const PRESENCE_LOW_HZ: f64 = 1_800.0;
/// Upper edge of the presence band.
pub const PRESENCE_HIGH_HZ: f64 = 3_800.0;

const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Convert decibels to a linear amplitude factor.
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Second-order IIR section (RBJ cookbook coefficients, normalized a0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    pub fn lowpass(sample_rate: f64, cutoff_hz: f64, q: f64) -> Self {
        let (cos_w, alpha) = Self::prewarp(sample_rate, cutoff_hz, q);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos_w) / 2.0 / a0,
            b1: (1.0 - cos_w) / a0,
            b2: (1.0 - cos_w) / 2.0 / a0,
            a1: -2.0 * cos_w / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    pub fn highpass(sample_rate: f64, cutoff_hz: f64, q: f64) -> Self {
        let (cos_w, alpha) = Self::prewarp(sample_rate, cutoff_hz, q);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 + cos_w) / 2.0 / a0,
            b1: -(1.0 + cos_w) / a0,
            b2: (1.0 + cos_w) / 2.0 / a0,
            a1: -2.0 * cos_w / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn prewarp(sample_rate: f64, cutoff_hz: f64, q: f64) -> (f64, f64) {
        let w0 = 2.0 * std::f64::consts::PI * cutoff_hz / sample_rate;
        (w0.cos(), w0.sin() / (2.0 * q))
    }

    /// Filter a whole signal from rest (transposed direct form II).
    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        let mut z1 = 0.0f64;
        let mut z2 = 0.0f64;
        input
            .iter()
            .map(|x| {
                let x = f64::from(*x);
                let y = self.b0 * x + z1;
                z1 = self.b1 * x - self.a1 * y + z2;
                z2 = self.b2 * x - self.a2 * y;
                y as f32
            })
            .collect()
    }
}

/// The filter bank used by [`shape`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShelfFilters {
    bass: Biquad,
    presence_highpass: Biquad,
    presence_lowpass: Biquad,
}

impl ShelfFilters {
    /// Design the bank for a sample rate.
    ///
    /// Unavailable when the presence band does not fit below Nyquist.
    pub fn design(sample_rate: u32) -> Capability<ShelfFilters> {
        let sr = f64::from(sample_rate);
        let nyquist = sr / 2.0;
        if sample_rate == 0 || PRESENCE_HIGH_HZ >= nyquist {
            return Capability::unavailable(format!(
                "presence band up to {} Hz needs a sample rate above {} Hz, got {}",
                PRESENCE_HIGH_HZ,
                2.0 * PRESENCE_HIGH_HZ,
                sample_rate
            ));
        }
        Capability::Available(ShelfFilters {
            bass: Biquad::lowpass(sr, BASS_CUTOFF_HZ, BUTTERWORTH_Q),
            presence_highpass: Biquad::highpass(sr, PRESENCE_LOW_HZ, BUTTERWORTH_Q),
            presence_lowpass: Biquad::lowpass(sr, PRESENCE_HIGH_HZ, BUTTERWORTH_Q),
        })
    }

    fn bass_band(&self, samples: &[f32]) -> Vec<f32> {
        self.bass.process(samples)
    }

    fn presence_band(&self, samples: &[f32]) -> Vec<f32> {
        self.presence_lowpass
            .process(&self.presence_highpass.process(samples))
    }
}

/// Apply bass then presence emphasis.
///
/// Passes the buffer through untouched when the filter bank is unavailable.
pub fn shape(
    buffer: &AudioBuffer,
    filters: &Capability<ShelfFilters>,
    bass_db: f32,
    presence_db: f32,
) -> AudioBuffer {
    let Some(filters) = filters.as_available() else {
        return buffer.clone();
    };

    let mut y = buffer.samples().to_vec();

    let bass_gain = db_to_gain(bass_db) - 1.0;
    if bass_gain != 0.0 {
        let bass = filters.bass_band(&y);
        for (s, b) in y.iter_mut().zip(bass) {
            *s += bass_gain * b;
        }
    }

    let presence_gain = db_to_gain(presence_db) - 1.0;
    if presence_gain != 0.0 {
        let presence = filters.presence_band(&y);
        for (s, p) in y.iter_mut().zip(presence) {
            *s += presence_gain * p;
        }
    }

    buffer.with_samples(y)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44_100;

    fn tone(freq: f64, secs: f64) -> AudioBuffer {
        let samples = (0..(secs * f64::from(SR)) as usize)
            .map(|i| (0.25 * (2.0 * std::f64::consts::PI * freq * i as f64 / f64::from(SR)).sin()) as f32)
            .collect();
        AudioBuffer::new(samples, SR)
    }

    /// RMS after the filter transient has settled.
    fn settled_rms(buf: &AudioBuffer) -> f32 {
        let skip = (0.2 * f64::from(SR)) as usize;
        AudioBuffer::new(buf.samples()[skip..].to_vec(), SR).rms()
    }

    #[test]
    fn test_db_to_gain() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(20.0) - 10.0).abs() < 1e-4);
        assert!((db_to_gain(-6.0) - 0.501).abs() < 1e-3);
    }

    #[test]
    fn test_zero_gain_is_identity() {
        let filters = ShelfFilters::design(SR);
        let buf = tone(440.0, 0.5);
        assert_eq!(shape(&buf, &filters, 0.0, 0.0), buf);
    }

    #[test]
    fn test_bass_boost_hits_low_end_only() {
        let filters = ShelfFilters::design(SR);
        assert!(filters.is_available());

        let low = tone(50.0, 1.0);
        let boosted = shape(&low, &filters, 6.0, 0.0);
        assert!(settled_rms(&boosted) > 1.5 * settled_rms(&low));

        let high = tone(8_000.0, 1.0);
        let untouched = shape(&high, &filters, 6.0, 0.0);
        assert!(settled_rms(&untouched) < 1.05 * settled_rms(&high));
    }

    #[test]
    fn test_presence_boost_hits_mid_band() {
        let filters = ShelfFilters::design(SR);
        let mid = tone(2_700.0, 1.0);
        let boosted = shape(&mid, &filters, 0.0, 6.0);
        assert!(settled_rms(&boosted) > 1.3 * settled_rms(&mid));
    }

    #[test]
    fn test_low_sample_rate_is_unavailable() {
        let filters = ShelfFilters::design(6_000);
        assert!(!filters.is_available());
        assert!(filters.reason().unwrap().contains("6000"));

        let buf = AudioBuffer::new(vec![0.1, 0.2, 0.3], 6_000);
        assert_eq!(shape(&buf, &filters, 12.0, 12.0), buf);
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let lp = Biquad::lowpass(f64::from(SR), BASS_CUTOFF_HZ, BUTTERWORTH_Q);
        let out = lp.process(&vec![1.0f32; SR as usize]);
        assert!((out[out.len() - 1] - 1.0).abs() < 1e-3);

        let hp = Biquad::highpass(f64::from(SR), PRESENCE_LOW_HZ, BUTTERWORTH_Q);
        let out = hp.process(&vec![1.0f32; SR as usize]);
        assert!(out[out.len() - 1].abs() < 1e-3);
    }
}
