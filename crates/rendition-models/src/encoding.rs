//! Video encoding configuration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ModelError;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "h264";
/// Default H.264 profile
pub const DEFAULT_PROFILE: &str = "main";
/// Default H.264 level
pub const DEFAULT_LEVEL: &str = "4.0";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 22;
/// Default pixel format
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
/// Frame rate ceiling for encoded renditions
pub const DEFAULT_MAX_FRAME_RATE: u32 = 60;
/// Keyframe spacing in seconds
pub const DEFAULT_KEYFRAME_INTERVAL_SECS: u32 = 2;

/// Thumbnail generation settings
pub const THUMBNAIL_TIMESTAMP: &str = "00:00:01.000";
pub const THUMBNAIL_WIDTH: u32 = 320;
pub const THUMBNAIL_HEIGHT: u32 = 180;
pub const THUMBNAIL_FILE_NAME: &str = "thumbnail.jpg";

/// How audio is carried through the transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioLayout {
    /// Video outputs drop audio; one shared audio-only output is produced.
    #[default]
    SharedTrack,
    /// Audio is re-encoded into every rendition.
    PerRung,
}

impl FromStr for AudioLayout {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shared" | "shared_track" => Ok(Self::SharedTrack),
            "per_rung" | "per-rung" => Ok(Self::PerRung),
            other => Err(ModelError::unknown_variant("audio layout", other)),
        }
    }
}

/// Encoding parameters shared by every rendition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Codec profile
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Codec level
    #[serde(default = "default_level")]
    pub level: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Output pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Frame rate ceiling
    #[serde(default = "default_max_frame_rate")]
    pub max_frame_rate: u32,

    /// Seconds between forced keyframes
    #[serde(default = "default_keyframe_interval")]
    pub keyframe_interval_secs: u32,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate (shared track, and per-rung fallback)
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Audio layout
    #[serde(default)]
    pub audio_layout: AudioLayout,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}
fn default_level() -> String {
    DEFAULT_LEVEL.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}
fn default_max_frame_rate() -> u32 {
    DEFAULT_MAX_FRAME_RATE
}
fn default_keyframe_interval() -> u32 {
    DEFAULT_KEYFRAME_INTERVAL_SECS
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            level: DEFAULT_LEVEL.to_string(),
            crf: DEFAULT_CRF,
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            max_frame_rate: DEFAULT_MAX_FRAME_RATE,
            keyframe_interval_secs: DEFAULT_KEYFRAME_INTERVAL_SECS,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            audio_layout: AudioLayout::default(),
        }
    }
}

impl EncodingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audio_layout(mut self, layout: AudioLayout) -> Self {
        self.audio_layout = layout;
        self
    }

    /// Frame rate actually encoded: the source rate capped at `max_frame_rate`.
    pub fn effective_frame_rate(&self, source_frame_rate: u32) -> u32 {
        source_frame_rate.min(self.max_frame_rate)
    }

    /// GOP length in frames for the given source frame rate.
    pub fn gop_length(&self, source_frame_rate: u32) -> u32 {
        self.effective_frame_rate(source_frame_rate) * self.keyframe_interval_secs
    }

    /// Video arguments applied to every rendition output.
    pub fn to_ffmpeg_video_args(&self, source_frame_rate: u32) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-profile:v".to_string(),
            self.profile.clone(),
            "-level:v".to_string(),
            self.level.clone(),
            "-r".to_string(),
            self.effective_frame_rate(source_frame_rate).to_string(),
            "-g".to_string(),
            self.gop_length(source_frame_rate).to_string(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-movflags".to_string(),
            "faststart".to_string(),
            "-map_metadata".to_string(),
            "-1".to_string(),
        ]
    }

    /// Audio encode arguments at the given bitrate.
    pub fn to_ffmpeg_audio_args(&self, bitrate: &str) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            bitrate.to_string(),
        ]
    }
}
