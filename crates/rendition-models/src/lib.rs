//! Shared data models for the rendition worker.
//!
//! This crate provides:
//! - Video identity and probed source metadata
//! - Quality rungs and the default rendition ladder
//! - Encoding configuration (codec parameters, audio layout)
//! - Content-type resolution for output artifacts

pub mod content_type;
pub mod encoding;
pub mod error;
pub mod ladder;
pub mod video;

// Re-export common types
pub use content_type::{base_name, content_type_for};
pub use encoding::{AudioLayout, EncodingConfig};
pub use error::{ModelError, ModelResult};
pub use ladder::{default_candidates, QualityRung};
pub use video::{VideoId, VideoMetadata};
