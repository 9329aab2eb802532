//! Numeric features fed to the virality scorer.

pub mod audio;
pub mod video;

pub use audio::{extract_audio_features, mean_spectral_centroid, AudioFeatures};
pub use video::{extract_video_features, VideoFeatureExtractor, VideoFeatures};
