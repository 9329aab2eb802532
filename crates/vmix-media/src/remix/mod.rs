//! Single-track audio remix engine.
//!
//! Works without stems: the most energetic window is cropped, nudged toward
//! a target tempo, optionally layered with a loop, then EQ'd and limited.
//! Every stage is a pure function over an [`AudioBuffer`]; only
//! [`RemixEngine::apply`] touches the filesystem.

pub mod buffer;
pub mod engine;
pub mod limiter;
pub mod overlay;
pub mod segment;
pub mod shaping;
pub mod stretch;
pub mod tempo;

pub use buffer::{load_audio, load_audio_segment, save_wav, AudioBuffer};
pub use engine::{render, RemixEngine, RenderedRemix};
pub use limiter::limit;
pub use overlay::overlay_loop;
pub use segment::{pick_best_segment, rms_envelope};
pub use shaping::{db_to_gain, shape, Biquad, ShelfFilters};
pub use stretch::time_stretch;
pub use tempo::{estimate_bpm, normalize_tempo, resample, stretch_rate, DEFAULT_BPM};
