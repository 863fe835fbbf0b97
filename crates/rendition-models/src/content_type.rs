//! Content-type resolution for output artifacts.

use std::path::Path;

pub const DASH_MANIFEST: &str = "application/dash+xml";
pub const HLS_PLAYLIST: &str = "application/vnd.apple.mpegurl";
pub const MP4_VIDEO: &str = "video/mp4";

/// Content type for an artifact, derived from its extension.
///
/// Manifests are special-cased because extension databases disagree on them.
pub fn content_type_for(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mpd") => DASH_MANIFEST.to_string(),
        Some("m3u8") => HLS_PLAYLIST.to_string(),
        _ => mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Final path component, used as the object name.
pub fn base_name(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
