#![deny(unreachable_patterns)]
//! FFprobe, FFmpeg and packager CLI wrappers.
//!
//! This crate provides:
//! - Typed tool commands and an async process runner
//! - Source probing
//! - Rendition ladder planning
//! - Multi-output transcode and thumbnail extraction
//! - HLS/DASH packaging

pub mod command;
pub mod error;
pub mod ladder;
pub mod package;
pub mod probe;
pub mod thumbnail;
pub mod transcode;

pub use command::{ProcessRunner, ToolCommand, ToolOutput, ToolPaths, ToolRunner};
pub use error::{MediaError, MediaResult};
pub use ladder::plan_ladder;
pub use package::{build_package, run_package, AudioGroup, PackagePlan};
pub use probe::{parse_probe_output, probe_video};
pub use thumbnail::extract_thumbnail;
pub use transcode::{build_transcode, run_transcode, Rendition, TranscodePlan};
