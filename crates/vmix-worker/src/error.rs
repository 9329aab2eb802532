//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Candidates were requested but have not been delivered yet.
    #[error(
        "No generated videos for platform={platform} yet. Place the clips under {} and rerun in resume mode",
        directory.display()
    )]
    CandidatesPending { platform: String, directory: PathBuf },

    /// Candidates should exist by now; nothing usable was found.
    #[error(
        "No generated videos for platform={platform}. Check {} and the manifest paths",
        directory.display()
    )]
    NoCandidates { platform: String, directory: PathBuf },

    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Invalid run request: {0}")]
    InvalidRequest(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] vmix_media::MediaError),

    #[error("ML client error: {0}")]
    MlClient(#[from] vmix_ml_client::MlClientError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether rerunning later (after delivery) can succeed.
    pub fn is_pending(&self) -> bool {
        matches!(self, WorkerError::CandidatesPending { .. })
    }

    /// Whether the failure came from an external transcoder/probe run.
    pub fn is_external_process(&self) -> bool {
        matches!(self, WorkerError::Media(e) if e.is_external_process())
    }
}
