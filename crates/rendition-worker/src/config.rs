//! Worker configuration.
//!
//! Everything is read once, in [`WorkerConfig::from_env`]; the result is passed
//! by reference to every component.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rendition_media::ToolPaths;
use rendition_models::{AudioLayout, EncodingConfig, VideoId};
use rendition_storage::R2Config;

use crate::error::{WorkerError, WorkerResult};

/// Where the source video comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Object `video/{id}/original` in the bucket
    Storage,
    /// A file on local disk (development and tests)
    LocalFile(PathBuf),
}

/// Where the packaged artifacts go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// Multipart sessions brokered by the control plane
    #[default]
    ControlPlane,
    /// Plain `put_object` into the bucket
    DirectStorage,
}

impl FromStr for UploadMode {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "control_plane" | "control-plane" => Ok(Self::ControlPlane),
            "direct_storage" | "direct-storage" => Ok(Self::DirectStorage),
            other => Err(WorkerError::config_error(format!(
                "UPLOAD_MODE must be control_plane or direct_storage, got {:?}",
                other
            ))),
        }
    }
}

/// Upload pool sizes and retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub part_concurrency: usize,
    pub artifact_concurrency: usize,
    pub part_retries: u32,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            part_concurrency: 4,
            artifact_concurrency: 1,
            part_retries: 3,
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Video being processed
    pub video_id: VideoId,
    /// Control-plane base URL; without it nothing is reported back
    pub callback_url: Option<String>,
    /// Scheduler attempt number, only used in failure logs
    pub task_attempt: u32,
    /// Scratch directory for the source and intermediate files
    pub work_dir: PathBuf,
    pub source: SourceLocation,
    pub upload_mode: UploadMode,
    pub tools: ToolPaths,
    /// Kill an external tool after this long
    pub tool_timeout: Option<Duration>,
    pub encoding: EncodingConfig,
    pub upload: UploadSettings,
    pub control_plane_timeout: Duration,
    /// Required when the source or the outputs live in the bucket
    pub storage: Option<R2Config>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            video_id: VideoId::from("local"),
            callback_url: None,
            task_attempt: 0,
            work_dir: PathBuf::from("/tmp/rendition"),
            source: SourceLocation::Storage,
            upload_mode: UploadMode::default(),
            tools: ToolPaths::default(),
            tool_timeout: None,
            encoding: EncodingConfig::default(),
            upload: UploadSettings::default(),
            control_plane_timeout: Duration::from_secs(60),
            storage: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup (the environment, or a map in tests).
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let video_id = get("VIDEO_ID")
            .map(VideoId::from)
            .ok_or_else(|| WorkerError::config_error("VIDEO_ID not set"))?;

        let source = match get("SOURCE_PATH") {
            Some(path) => SourceLocation::LocalFile(PathBuf::from(path)),
            None => SourceLocation::Storage,
        };

        let upload_mode = match get("UPLOAD_MODE") {
            Some(mode) => mode.parse()?,
            None => UploadMode::default(),
        };

        let audio_layout = match get("AUDIO_LAYOUT") {
            Some(layout) => layout
                .parse::<AudioLayout>()
                .map_err(|e| WorkerError::config_error(e.to_string()))?,
            None => AudioLayout::default(),
        };

        let tools = ToolPaths {
            ffmpeg: get("FFMPEG_PATH").map_or(defaults.tools.ffmpeg, PathBuf::from),
            ffprobe: get("FFPROBE_PATH").map_or(defaults.tools.ffprobe, PathBuf::from),
            packager: get("PACKAGER_PATH").map_or(defaults.tools.packager, PathBuf::from),
        };

        let storage = match (
            get("R2_ENDPOINT_URL"),
            get("R2_ACCESS_KEY_ID"),
            get("R2_SECRET_ACCESS_KEY"),
            get("R2_BUCKET_NAME"),
        ) {
            (
                Some(endpoint_url),
                Some(access_key_id),
                Some(secret_access_key),
                Some(bucket_name),
            ) => Some(R2Config {
                endpoint_url,
                access_key_id,
                secret_access_key,
                bucket_name,
                region: get("R2_REGION").unwrap_or_else(|| "auto".to_string()),
            }),
            _ => None,
        };

        let work_dir = get("WORKER_WORK_DIR").map_or(defaults.work_dir, PathBuf::from);
        let work_dir = std::path::absolute(&work_dir).map_err(|e| {
            WorkerError::config_error(format!("WORKER_WORK_DIR {}: {}", work_dir.display(), e))
        })?;

        let config = Self {
            video_id,
            callback_url: get("CALLBACK_URL"),
            task_attempt: parse_or("CLOUD_RUN_TASK_ATTEMPT", get("CLOUD_RUN_TASK_ATTEMPT"), 0)?,
            work_dir,
            source,
            upload_mode,
            tools,
            tool_timeout: get("TOOL_TIMEOUT_SECS")
                .map(|v| parse_or("TOOL_TIMEOUT_SECS", Some(v), 0))
                .transpose()?
                .map(Duration::from_secs),
            encoding: EncodingConfig::default().with_audio_layout(audio_layout),
            upload: UploadSettings {
                part_concurrency: parse_or(
                    "UPLOAD_PART_CONCURRENCY",
                    get("UPLOAD_PART_CONCURRENCY"),
                    defaults.upload.part_concurrency,
                )?,
                artifact_concurrency: parse_or(
                    "UPLOAD_ARTIFACT_CONCURRENCY",
                    get("UPLOAD_ARTIFACT_CONCURRENCY"),
                    defaults.upload.artifact_concurrency,
                )?,
                part_retries: parse_or(
                    "UPLOAD_PART_RETRIES",
                    get("UPLOAD_PART_RETRIES"),
                    defaults.upload.part_retries,
                )?,
            },
            control_plane_timeout: Duration::from_secs(parse_or(
                "CONTROL_PLANE_TIMEOUT_SECS",
                get("CONTROL_PLANE_TIMEOUT_SECS"),
                defaults.control_plane_timeout.as_secs(),
            )?),
            storage,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field requirements.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.upload_mode == UploadMode::ControlPlane && self.callback_url.is_none() {
            return Err(WorkerError::config_error(
                "CALLBACK_URL is required when UPLOAD_MODE=control_plane",
            ));
        }
        if self.needs_storage() && self.storage.is_none() {
            return Err(WorkerError::config_error(
                "R2_ENDPOINT_URL, R2_ACCESS_KEY_ID, R2_SECRET_ACCESS_KEY and R2_BUCKET_NAME \
                 are required to read or write the bucket",
            ));
        }
        if self.upload.part_concurrency == 0 || self.upload.artifact_concurrency == 0 {
            return Err(WorkerError::config_error(
                "upload concurrency must be at least 1",
            ));
        }
        Ok(())
    }

    /// Copy safe to log: the storage secret is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(storage) = copy.storage.as_mut() {
            storage.secret_access_key = "***".to_string();
        }
        copy
    }

    /// Whether any stage talks to the bucket directly.
    pub fn needs_storage(&self) -> bool {
        self.source == SourceLocation::Storage || self.upload_mode == UploadMode::DirectStorage
    }

    /// Where the source is placed before probing.
    pub fn input_path(&self) -> PathBuf {
        self.work_dir.join("input.mp4")
    }

    /// Where the packager writes its outputs.
    pub fn output_dir(&self) -> PathBuf {
        self.work_dir.join("out")
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> WorkerResult<T> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| {
            WorkerError::config_error(format!("{} is not a valid number: {:?}", key, v))
        }),
        None => Ok(default),
    }
}
