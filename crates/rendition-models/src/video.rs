//! Video identity and probed source metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};

/// Identifier of the video this worker run is processing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Source video properties, created once from probe output.
///
/// Fields are private so the positivity invariants established by
/// [`VideoMetadata::new`] cannot be broken after construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoMetadata {
    width: u32,
    height: u32,
    frame_rate: u32,
    duration_seconds: f64,
}

impl VideoMetadata {
    /// Validate and build metadata.
    ///
    /// Width, height and frame rate must be strictly positive; duration must be
    /// finite and non-negative.
    pub fn new(width: u32, height: u32, frame_rate: u32, duration_seconds: f64) -> ModelResult<Self> {
        if width == 0 || height == 0 {
            return Err(ModelError::invalid_metadata(format!(
                "resolution must be positive, got {}x{}",
                width, height
            )));
        }
        if frame_rate == 0 {
            return Err(ModelError::invalid_metadata("frame rate must be positive"));
        }
        if !duration_seconds.is_finite() || duration_seconds < 0.0 {
            return Err(ModelError::invalid_metadata(format!(
                "duration must be a non-negative number, got {}",
                duration_seconds
            )));
        }

        Ok(Self {
            width,
            height,
            frame_rate,
            duration_seconds,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Duration truncated toward zero, as reported to the control plane.
    pub fn whole_seconds(&self) -> u64 {
        self.duration_seconds.trunc() as u64
    }
}

impl fmt::Display for VideoMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} @ {}fps, {:.2}s",
            self.width, self.height, self.frame_rate, self.duration_seconds
        )
    }
}
