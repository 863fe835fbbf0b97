//! Video transcoding worker.
//!
//! This crate provides:
//! - Configuration from the environment
//! - Source fetchers, artifact sinks and the completion notifier
//! - The stage-by-stage job pipeline
//! - Structured job logging

pub mod adapters;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use adapters::{Adapters, Artifact, ArtifactSink, CompletionNotifier, SourceFetcher};
pub use config::{SourceLocation, UploadMode, UploadSettings, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use pipeline::{Pipeline, PipelineState, Stage, StageFailure};
