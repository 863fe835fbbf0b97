//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while probing, transcoding or packaging.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("FFprobe command failed: {message}")]
    ProbeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Malformed probe output: {0}")]
    ProbeParse(String),

    #[error("Transcode failed (exit code {exit_code:?})")]
    TranscodeFailed {
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("Packaging failed (exit code {exit_code:?})")]
    PackagingFailed {
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("{program} exited successfully but did not produce {path}")]
    MissingOutput { program: String, path: PathBuf },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Empty ladder: nothing to {0}")]
    EmptyLadder(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn probe_parse(message: impl Into<String>) -> Self {
        Self::ProbeParse(message.into())
    }

    /// Captured diagnostic output from the failing tool, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::ProbeFailed { stderr, .. } => stderr.as_deref(),
            Self::TranscodeFailed { stderr, .. } | Self::PackagingFailed { stderr, .. } => {
                Some(stderr.as_str())
            }
            _ => None,
        }
    }
}
