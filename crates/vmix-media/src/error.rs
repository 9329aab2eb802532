//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stdout: Option<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("FFmpeg reported success but output is missing or too small: {path} ({size} bytes, need {min_bytes})")]
    OutputTooSmall {
        path: PathBuf,
        size: u64,
        min_bytes: u64,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("Invalid remix plan: {0}")]
    InvalidPlan(String),

    #[error("Face detection failed: {0}")]
    DetectionFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stdout: None,
            stderr,
            exit_code,
        }
    }

    /// Create an FFmpeg failure error carrying both captured streams.
    pub fn ffmpeg_failed_with_output(
        message: impl Into<String>,
        stdout: &[u8],
        stderr: &[u8],
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stdout: Some(String::from_utf8_lossy(stdout).to_string()),
            stderr: Some(String::from_utf8_lossy(stderr).to_string()),
            exit_code,
        }
    }

    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error came from an external transcoder/probe run,
    /// including runs that exited cleanly but left no usable output.
    pub fn is_external_process(&self) -> bool {
        matches!(
            self,
            MediaError::FfmpegFailed { .. }
                | MediaError::FfprobeFailed { .. }
                | MediaError::OutputTooSmall { .. }
                | MediaError::Timeout(_)
        )
    }

    /// Captured diagnostic output of a failed external process, if any.
    pub fn diagnostics(&self) -> Option<String> {
        match self {
            MediaError::FfmpegFailed { stdout, stderr, .. } => Some(format!(
                "STDOUT:\n{}\n\nSTDERR:\n{}",
                stdout.as_deref().unwrap_or_default(),
                stderr.as_deref().unwrap_or_default()
            )),
            MediaError::FfprobeFailed { stderr, .. } => stderr.clone(),
            _ => None,
        }
    }
}
