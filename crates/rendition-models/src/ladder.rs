//! Quality rungs of the rendition ladder.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One candidate output tier.
///
/// `width_threshold`/`height_threshold` only decide whether the rung is kept
/// for a given source; the encoded size is `output_width:output_height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityRung {
    /// Label used in file names and playlists (e.g. "720p")
    pub name: String,
    /// Width gate
    pub width_threshold: u32,
    /// Height gate
    pub height_threshold: u32,
    /// Encoded width
    pub output_width: u32,
    /// Encoded height
    pub output_height: u32,
    /// Per-rung audio bitrate, used when audio is encoded into each rendition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<String>,
}

impl QualityRung {
    pub fn new(
        name: impl Into<String>,
        threshold: (u32, u32),
        output: (u32, u32),
    ) -> Self {
        Self {
            name: name.into(),
            width_threshold: threshold.0,
            height_threshold: threshold.1,
            output_width: output.0,
            output_height: output.1,
            audio_bitrate: None,
        }
    }

    /// Floor rung: gated at `(0,0)` so it survives every source.
    pub fn floor(name: impl Into<String>, output: (u32, u32)) -> Self {
        Self::new(name, (0, 0), output)
    }

    pub fn with_audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = Some(bitrate.into());
        self
    }

    pub fn is_floor(&self) -> bool {
        self.width_threshold == 0 && self.height_threshold == 0
    }

    /// FFmpeg scale filter for this rung.
    pub fn scale_filter(&self) -> String {
        format!("scale={}:{}", self.output_width, self.output_height)
    }

    /// Path of the transcoded (pre-packaging) rendition.
    pub fn rendition_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.mp4", self.name))
    }

    /// Packaged video container name.
    pub fn packaged_name(&self) -> String {
        format!("video_{}.mp4", self.name)
    }

    /// HLS media playlist name.
    pub fn playlist_name(&self) -> String {
        format!("video_{}.m3u8", self.name)
    }

    /// HLS I-frame playlist name.
    pub fn iframe_playlist_name(&self) -> String {
        format!("video_{}_iframe.m3u8", self.name)
    }
}

/// Built-in candidate list, highest quality first, ending in the 480p floor.
pub fn default_candidates() -> Vec<QualityRung> {
    vec![
        QualityRung::new("1080p", (1920, 1080), (1920, 1080)),
        QualityRung::new("720p", (1280, 720), (1280, 720)),
        QualityRung::floor("480p", (854, 480)),
    ]
}
