//! Control-plane error types.

use reqwest::StatusCode;
use thiserror::Error;

pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// The control plane answered, but not with what the upload protocol expects.
    #[error("Upload protocol error: {0}")]
    Protocol(String),

    #[error("{endpoint} returned {status}: {body}")]
    HttpStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("Part {part_number} failed: {message}")]
    PartTransfer {
        part_number: u32,
        message: String,
        retryable: bool,
    },

    #[error("Invalid callback URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlPlaneError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Whether repeating the same request could succeed.
    ///
    /// Network failures, 5xx and 429 are transient; everything else is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::HttpStatus { status, .. } => is_transient_status(*status),
            Self::PartTransfer { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
