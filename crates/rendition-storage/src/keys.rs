//! Object key layout.
//!
//! ```text
//! video/{video_id}/original        uploaded source
//! video/{video_id}/{artifact}      packaged outputs, flat
//! ```

use std::path::Path;

use rendition_models::{base_name, VideoId};

/// Key of the uploaded source video.
pub fn source_key(video_id: &VideoId) -> String {
    format!("video/{}/original", video_id)
}

/// Key of a packaged artifact; only the file name is kept.
pub fn output_key(video_id: &VideoId, artifact: impl AsRef<Path>) -> String {
    format!("video/{}/{}", video_id, base_name(artifact))
}
