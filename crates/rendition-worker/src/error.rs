//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Input fetch failed: {0}")]
    InputFetch(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Stage {stage} reached without {missing}")]
    OutOfOrder {
        stage: &'static str,
        missing: &'static str,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rendition_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] rendition_media::MediaError),

    #[error("Control plane error: {0}")]
    ControlPlane(#[from] rendition_control::ControlPlaneError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn input_fetch(msg: impl Into<String>) -> Self {
        Self::InputFetch(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Captured tool diagnostics, for media failures.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Media(e) => e.diagnostics(),
            _ => None,
        }
    }
}
