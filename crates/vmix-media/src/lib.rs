#![deny(unreachable_patterns)]
//! Audio adaptation and FFmpeg-backed video assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a capturing runner
//! - The single-track audio remix engine (segment pick, tempo, EQ, limiter, loop)
//! - Video window selection by motion and face activity
//! - Crossfaded concatenation, best-window trims and audio/video muxing
//! - Audio and video feature extraction for scoring
//! - File materialization polling

pub mod clip;
pub mod command;
pub mod concat;
pub mod error;
pub mod features;
pub mod fs_utils;
pub mod metrics;
pub mod probe;
pub mod remix;
pub mod window;

pub use clip::{extract_segment, final_output_path, merge_video_audio, trim_to_best_window};
pub use command::{create_ffmpeg_command, FfmpegCommand, FfmpegRunner, MIN_VIDEO_OUTPUT_BYTES};
pub use concat::{
    build_xfade_filter, concatenate, expected_duration, ConcatConfig, SegmentConcatenator,
    DEFAULT_CROSSFADE_SECS,
};
pub use error::{MediaError, MediaResult};
pub use features::{
    extract_audio_features, extract_video_features, AudioFeatures, VideoFeatureExtractor,
    VideoFeatures,
};
pub use fs_utils::{wait_for_file, wait_with_fallback, WaitPolicy};
pub use probe::{probe_duration, probe_video, VideoInfo};
pub use remix::{AudioBuffer, RemixEngine};
pub use window::{select_video_window, VideoWindowSelector, WindowScoringConfig};
