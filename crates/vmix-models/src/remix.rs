//! Audio remix plan, presets and debug metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Default maximum fractional time stretch (+/- 12%).
pub const DEFAULT_MAX_TIME_STRETCH: f64 = 0.12;
/// Default bass boost in dB.
pub const DEFAULT_BASS_BOOST_DB: f32 = 4.0;
/// Default presence boost in dB.
pub const DEFAULT_PRESENCE_BOOST_DB: f32 = 1.5;
/// Default limiter ceiling (linear amplitude).
pub const DEFAULT_LIMITER_CEILING: f32 = 0.98;
/// Default loop mix level in dB (quieter than the primary).
pub const DEFAULT_DRUM_MIX_DB: f32 = -10.0;
/// Default output sample rate.
pub const DEFAULT_OUT_SAMPLE_RATE: u32 = 44_100;

/// Configuration for one remix pass.
///
/// Every optional field gates a stage: no explicit window means the
/// segment selector picks one, no `target_bpm` means no stretch, no
/// `drum_loop_path` means no overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RemixPlan {
    /// Explicit crop start (seconds)
    #[serde(default)]
    pub start_sec: Option<f64>,

    /// Explicit crop end (seconds)
    #[serde(default)]
    pub end_sec: Option<f64>,

    /// Tempo to stretch toward
    #[serde(default)]
    pub target_bpm: Option<f64>,

    /// Fractional bound on the stretch rate
    #[serde(default = "default_max_time_stretch")]
    pub max_time_stretch: f64,

    #[serde(default = "default_bass_boost_db")]
    pub bass_boost_db: f32,

    #[serde(default = "default_presence_boost_db")]
    pub presence_boost_db: f32,

    /// Final peak ceiling, in (0, 1]
    #[serde(default = "default_limiter_ceiling")]
    pub limiter_ceiling: f32,

    /// Secondary loop mixed under the primary
    #[serde(default)]
    pub drum_loop_path: Option<PathBuf>,

    #[serde(default = "default_drum_mix_db")]
    pub drum_mix_db: f32,

    #[serde(default = "default_out_sample_rate")]
    pub out_sample_rate: u32,
}

fn default_max_time_stretch() -> f64 {
    DEFAULT_MAX_TIME_STRETCH
}
fn default_bass_boost_db() -> f32 {
    DEFAULT_BASS_BOOST_DB
}
fn default_presence_boost_db() -> f32 {
    DEFAULT_PRESENCE_BOOST_DB
}
fn default_limiter_ceiling() -> f32 {
    DEFAULT_LIMITER_CEILING
}
fn default_drum_mix_db() -> f32 {
    DEFAULT_DRUM_MIX_DB
}
fn default_out_sample_rate() -> u32 {
    DEFAULT_OUT_SAMPLE_RATE
}

impl Default for RemixPlan {
    fn default() -> Self {
        Self {
            start_sec: None,
            end_sec: None,
            target_bpm: None,
            max_time_stretch: DEFAULT_MAX_TIME_STRETCH,
            bass_boost_db: DEFAULT_BASS_BOOST_DB,
            presence_boost_db: DEFAULT_PRESENCE_BOOST_DB,
            limiter_ceiling: DEFAULT_LIMITER_CEILING,
            drum_loop_path: None,
            drum_mix_db: DEFAULT_DRUM_MIX_DB,
            out_sample_rate: DEFAULT_OUT_SAMPLE_RATE,
        }
    }
}

impl RemixPlan {
    /// The explicit crop window, when both bounds are set.
    pub fn explicit_window(&self) -> Option<SegmentBounds> {
        match (self.start_sec, self.end_sec) {
            (Some(start_sec), Some(end_sec)) => Some(SegmentBounds { start_sec, end_sec }),
            _ => None,
        }
    }

    /// Tempo target, ignoring non-positive values.
    pub fn effective_target_bpm(&self) -> Option<f64> {
        self.target_bpm.filter(|bpm| *bpm > 0.0)
    }

    pub fn with_window(mut self, start_sec: f64, end_sec: f64) -> Self {
        self.start_sec = Some(start_sec);
        self.end_sec = Some(end_sec);
        self
    }

    pub fn with_target_bpm(mut self, bpm: f64) -> Self {
        self.target_bpm = Some(bpm);
        self
    }

    pub fn with_drum_loop(mut self, path: impl Into<PathBuf>, mix_db: f32) -> Self {
        self.drum_loop_path = Some(path.into());
        self.drum_mix_db = mix_db;
        self
    }

    /// Validate the plan.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.limiter_ceiling > 0.0 && self.limiter_ceiling <= 1.0) {
            return Err(format!(
                "limiter_ceiling must be in (0, 1], got {}",
                self.limiter_ceiling
            ));
        }
        if !(0.0..1.0).contains(&self.max_time_stretch) {
            return Err(format!(
                "max_time_stretch must be in [0, 1), got {}",
                self.max_time_stretch
            ));
        }
        if self.out_sample_rate == 0 {
            return Err("out_sample_rate must be positive".to_string());
        }
        if let Some(window) = self.explicit_window() {
            if window.start_sec < 0.0 || window.end_sec <= window.start_sec {
                return Err(format!(
                    "explicit window must satisfy 0 <= start < end, got {:.3}..{:.3}",
                    window.start_sec, window.end_sec
                ));
            }
        }
        Ok(())
    }
}

/// A time range inside an audio buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentBounds {
    pub start_sec: f64,
    pub end_sec: f64,
}

impl SegmentBounds {
    pub fn new(start_sec: f64, end_sec: f64) -> Self {
        Self { start_sec, end_sec }
    }

    pub fn duration(&self) -> f64 {
        (self.end_sec - self.start_sec).max(0.0)
    }
}

/// Debug metadata recorded by one remix pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RemixDebug {
    /// Tempo estimated on the full source
    pub source_bpm: f64,
    /// Window cropped from the source
    pub segment: SegmentBounds,
    pub target_bpm: Option<f64>,
    pub out_sample_rate: u32,
    pub out_path: PathBuf,
}

/// Named remix styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RemixPreset {
    /// Fast, punchy, bass-heavy edit with a loop
    JedagJedug,
    /// Four-on-the-floor at 128 BPM
    TiktokHouse,
    MellowRainy,
    CinematicEpic,
    LofiChill,
}

impl RemixPreset {
    pub const ALL: &'static [RemixPreset] = &[
        RemixPreset::JedagJedug,
        RemixPreset::TiktokHouse,
        RemixPreset::MellowRainy,
        RemixPreset::CinematicEpic,
        RemixPreset::LofiChill,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RemixPreset::JedagJedug => "jedag_jedug",
            RemixPreset::TiktokHouse => "tiktok_house",
            RemixPreset::MellowRainy => "mellow_rainy",
            RemixPreset::CinematicEpic => "cinematic_epic",
            RemixPreset::LofiChill => "lofi_chill",
        }
    }

    /// Whether the preset mixes in a drum loop when one is supplied.
    pub fn uses_drum_loop(&self) -> bool {
        matches!(self, RemixPreset::JedagJedug | RemixPreset::TiktokHouse)
    }

    /// Build the plan for this preset.
    ///
    /// `source_bpm` only matters for presets whose target tempo is relative
    /// to the source.
    pub fn plan(&self, source_bpm: f64, drum_loop: Option<PathBuf>) -> RemixPlan {
        let base = RemixPlan::default();
        match self {
            RemixPreset::JedagJedug => RemixPlan {
                target_bpm: Some((source_bpm * 1.10).min(160.0)),
                bass_boost_db: 6.5,
                presence_boost_db: 2.0,
                limiter_ceiling: 0.98,
                drum_loop_path: drum_loop,
                drum_mix_db: -9.0,
                ..base
            },
            RemixPreset::TiktokHouse => RemixPlan {
                target_bpm: Some(128.0),
                bass_boost_db: 5.0,
                presence_boost_db: 2.5,
                limiter_ceiling: 0.97,
                drum_loop_path: drum_loop,
                drum_mix_db: -10.0,
                ..base
            },
            RemixPreset::MellowRainy => RemixPlan {
                bass_boost_db: 2.0,
                presence_boost_db: 0.8,
                limiter_ceiling: 0.95,
                ..base
            },
            RemixPreset::CinematicEpic => RemixPlan {
                bass_boost_db: 4.0,
                presence_boost_db: 1.2,
                limiter_ceiling: 0.96,
                ..base
            },
            RemixPreset::LofiChill => RemixPlan {
                bass_boost_db: 1.5,
                presence_boost_db: 0.6,
                limiter_ceiling: 0.93,
                ..base
            },
        }
    }
}

impl fmt::Display for RemixPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RemixPreset {
    type Err = PresetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "jedag_jedug" => Ok(RemixPreset::JedagJedug),
            "tiktok_house" => Ok(RemixPreset::TiktokHouse),
            "mellow_rainy" => Ok(RemixPreset::MellowRainy),
            "cinematic_epic" => Ok(RemixPreset::CinematicEpic),
            "lofi_chill" => Ok(RemixPreset::LofiChill),
            _ => Err(PresetParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown remix preset: {0}")]
pub struct PresetParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_is_valid() {
        let plan = RemixPlan::default();
        assert!(plan.validate().is_ok());
        assert!(plan.explicit_window().is_none());
        assert!(plan.effective_target_bpm().is_none());
        assert!((plan.max_time_stretch - 0.12).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ceiling_bounds() {
        let mut plan = RemixPlan::default();
        plan.limiter_ceiling = 0.0;
        assert!(plan.validate().is_err());
        plan.limiter_ceiling = 1.0;
        assert!(plan.validate().is_ok());
        plan.limiter_ceiling = 1.2;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_inverted_window_rejected() {
        let plan = RemixPlan::default().with_window(10.0, 5.0);
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_half_window_is_not_explicit() {
        let plan = RemixPlan {
            start_sec: Some(3.0),
            ..Default::default()
        };
        assert!(plan.explicit_window().is_none());
    }

    #[test]
    fn test_jedag_jedug_caps_tempo() {
        let plan = RemixPreset::JedagJedug.plan(150.0, None);
        assert_eq!(plan.target_bpm, Some(160.0));
        let plan = RemixPreset::JedagJedug.plan(100.0, Some("loop.wav".into()));
        assert!((plan.target_bpm.unwrap() - 110.0).abs() < 1e-9);
        assert_eq!(plan.drum_loop_path, Some(PathBuf::from("loop.wav")));
    }

    #[test]
    fn test_calm_presets_have_no_tempo_target() {
        for preset in [
            RemixPreset::MellowRainy,
            RemixPreset::CinematicEpic,
            RemixPreset::LofiChill,
        ] {
            let plan = preset.plan(120.0, Some("loop.wav".into()));
            assert!(plan.target_bpm.is_none());
            assert!(plan.drum_loop_path.is_none());
            assert!(plan.validate().is_ok());
        }
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!(
            "TikTok-House".parse::<RemixPreset>().unwrap(),
            RemixPreset::TiktokHouse
        );
        assert!("polka".parse::<RemixPreset>().is_err());
        for preset in RemixPreset::ALL {
            assert_eq!(preset.as_str().parse::<RemixPreset>().unwrap(), *preset);
        }
    }

    #[test]
    fn test_plan_deserialize_defaults() {
        let plan: RemixPlan = serde_json::from_str(r#"{"target_bpm": 128.0}"#).unwrap();
        assert_eq!(plan.target_bpm, Some(128.0));
        assert_eq!(plan.out_sample_rate, DEFAULT_OUT_SAMPLE_RATE);
        assert!((plan.limiter_ceiling - DEFAULT_LIMITER_CEILING).abs() < f32::EPSILON);
    }
}
