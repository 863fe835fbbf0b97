//! Structured job logging utilities.
//!
//! Every line carries the video id and the pipeline stage as fields, so a
//! single job can be followed through the JSON log output.

use std::fmt::Display;
use std::time::Duration;

use tracing::{error, info, warn, Span};

use rendition_models::VideoId;

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    video_id: String,
    attempt: u32,
}

impl JobLogger {
    /// Create a logger for one attempt at one video.
    pub fn new(video_id: &VideoId, attempt: u32) -> Self {
        Self {
            video_id: video_id.to_string(),
            attempt,
        }
    }

    /// Log the start of the job.
    pub fn log_start(&self) {
        info!(
            video_id = %self.video_id,
            attempt = self.attempt,
            "Starting processing of video {}", self.video_id
        );
    }

    /// Log entry into a stage.
    pub fn log_stage_start(&self, stage: impl Display) {
        info!(
            video_id = %self.video_id,
            stage = %stage,
            "===== {} =====", stage
        );
    }

    /// Log a stage that finished successfully.
    pub fn log_stage_complete(&self, stage: impl Display, elapsed: Duration) {
        info!(
            video_id = %self.video_id,
            stage = %stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage {} complete", stage
        );
    }

    /// Log a warning during a stage.
    pub fn log_warning(&self, stage: impl Display, message: &str) {
        warn!(
            video_id = %self.video_id,
            stage = %stage,
            "Job warning: {}", message
        );
    }

    /// Log the failure that ends the attempt, with any captured tool output.
    pub fn log_failure(&self, stage: impl Display, err: impl Display, diagnostics: Option<&str>) {
        error!(
            video_id = %self.video_id,
            stage = %stage,
            attempt = self.attempt,
            "Stage {} failed: {}", stage, err
        );
        if let Some(stderr) = diagnostics.map(str::trim).filter(|s| !s.is_empty()) {
            error!(video_id = %self.video_id, stage = %stage, "Tool output:\n{}", stderr);
        }
    }

    /// Log the completion of the job.
    pub fn log_completion(&self, elapsed: Duration) {
        info!(
            video_id = %self.video_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "Video {} processed", self.video_id
        );
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            video_id = %self.video_id,
            attempt = self.attempt
        )
    }
}
