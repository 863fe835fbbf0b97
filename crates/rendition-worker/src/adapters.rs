//! Source, publish and completion collaborators.
//!
//! The pipeline only sees the traits; which implementation is used follows
//! from [`WorkerConfig`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use tracing::info;

use rendition_control::{
    CompletionNotice, ControlPlaneClient, ControlPlaneConfig, RetryConfig, UploadKind,
    UploadOptions, UploadSessionManager,
};
use rendition_models::{content_type_for, VideoId};
use rendition_storage::{output_key, source_key, R2Client};

use crate::config::{SourceLocation, UploadMode, WorkerConfig};
use crate::error::{WorkerError, WorkerResult};

/// One file to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// Rung name, for packaged rendition containers
    pub quality: Option<String>,
}

impl Artifact {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            quality: None,
        }
    }

    pub fn rendition(path: impl Into<PathBuf>, quality: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            quality: Some(quality.into()),
        }
    }
}

/// Places the source video at a local path.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, video_id: &VideoId, dest: &Path) -> WorkerResult<()>;
}

/// Publishes packaged artifacts. Returns the key of each, in input order.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn publish(
        &self,
        video_id: &VideoId,
        artifacts: &[Artifact],
    ) -> WorkerResult<Vec<String>>;
}

/// Reports a finished job.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, notice: &CompletionNotice) -> WorkerResult<()>;
}

// ============================================================================
// Sources
// ============================================================================

/// Downloads `video/{id}/original` from the bucket.
pub struct StorageFetcher {
    client: R2Client,
}

impl StorageFetcher {
    pub fn new(client: R2Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceFetcher for StorageFetcher {
    async fn fetch(&self, video_id: &VideoId, dest: &Path) -> WorkerResult<()> {
        let key = source_key(video_id);
        info!("Downloading {} to {}", key, dest.display());
        self.client
            .download_file(&key, dest)
            .await
            .map_err(|e| WorkerError::input_fetch(format!("{}: {}", key, e)))?;
        Ok(())
    }
}

/// Copies a local file into the work directory.
pub struct LocalFileFetcher {
    source: PathBuf,
}

impl LocalFileFetcher {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
impl SourceFetcher for LocalFileFetcher {
    async fn fetch(&self, _video_id: &VideoId, dest: &Path) -> WorkerResult<()> {
        info!("Copying {} to {}", self.source.display(), dest.display());
        tokio::fs::copy(&self.source, dest)
            .await
            .map_err(|e| WorkerError::input_fetch(format!("{}: {}", self.source.display(), e)))?;
        Ok(())
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Uploads through control-plane multipart sessions.
pub struct ControlPlaneSink {
    sessions: UploadSessionManager,
}

impl ControlPlaneSink {
    pub fn new(sessions: UploadSessionManager) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl ArtifactSink for ControlPlaneSink {
    async fn publish(
        &self,
        _video_id: &VideoId,
        artifacts: &[Artifact],
    ) -> WorkerResult<Vec<String>> {
        let uploads: Vec<(PathBuf, UploadKind)> = artifacts
            .iter()
            .map(|a| {
                let kind = match &a.quality {
                    Some(quality) => UploadKind::Quality(quality.clone()),
                    None => UploadKind::File,
                };
                (a.path.clone(), kind)
            })
            .collect();

        Ok(self.sessions.upload_all(&uploads).await?)
    }
}

/// Writes artifacts straight into the bucket under `video/{id}/`.
pub struct DirectStorageSink {
    client: R2Client,
    concurrency: usize,
}

impl DirectStorageSink {
    pub fn new(client: R2Client, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }
}

#[async_trait]
impl ArtifactSink for DirectStorageSink {
    async fn publish(
        &self,
        video_id: &VideoId,
        artifacts: &[Artifact],
    ) -> WorkerResult<Vec<String>> {
        stream::iter(artifacts.iter().cloned())
            .map(|artifact| async move {
                let key = output_key(video_id, &artifact.path);
                let content_type = content_type_for(&artifact.path);
                self.client
                    .upload_file(&artifact.path, &key, &content_type)
                    .await?;
                Ok::<_, WorkerError>(key)
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}

// ============================================================================
// Completion
// ============================================================================

/// Posts the completion notice to `{callback}/complete`.
pub struct ControlPlaneNotifier {
    client: ControlPlaneClient,
}

impl ControlPlaneNotifier {
    pub fn new(client: ControlPlaneClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CompletionNotifier for ControlPlaneNotifier {
    async fn notify(&self, notice: &CompletionNotice) -> WorkerResult<()> {
        Ok(self.client.notify_complete(notice).await?)
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Concrete collaborators selected by the configuration.
pub struct Adapters {
    pub fetcher: Box<dyn SourceFetcher>,
    pub sink: Box<dyn ArtifactSink>,
    pub notifier: Option<Box<dyn CompletionNotifier>>,
}

impl Adapters {
    pub fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        let storage = match (&config.storage, config.needs_storage()) {
            (Some(r2), true) => Some(R2Client::new(r2.clone())?),
            _ => None,
        };
        let control_plane = match &config.callback_url {
            Some(url) => {
                let cp_config =
                    ControlPlaneConfig::new(url)?.with_timeout(config.control_plane_timeout);
                Some(ControlPlaneClient::new(cp_config)?)
            }
            None => None,
        };
        let missing = |what: &str| WorkerError::config_error(format!("{} is not configured", what));

        let fetcher: Box<dyn SourceFetcher> = match &config.source {
            SourceLocation::LocalFile(path) => Box::new(LocalFileFetcher::new(path)),
            SourceLocation::Storage => Box::new(StorageFetcher::new(
                storage.clone().ok_or_else(|| missing("storage"))?,
            )),
        };

        let sink: Box<dyn ArtifactSink> = match config.upload_mode {
            UploadMode::ControlPlane => {
                let client = control_plane
                    .clone()
                    .ok_or_else(|| missing("CALLBACK_URL"))?;
                let options = UploadOptions {
                    part_concurrency: config.upload.part_concurrency,
                    artifact_concurrency: config.upload.artifact_concurrency,
                    part_retry: RetryConfig::new("put_part")
                        .with_max_retries(config.upload.part_retries),
                };
                Box::new(ControlPlaneSink::new(UploadSessionManager::new(
                    client, options,
                )))
            }
            UploadMode::DirectStorage => Box::new(DirectStorageSink::new(
                storage.ok_or_else(|| missing("storage"))?,
                config.upload.artifact_concurrency,
            )),
        };

        let notifier = control_plane.map(|client| {
            Box::new(ControlPlaneNotifier::new(client)) as Box<dyn CompletionNotifier>
        });

        Ok(Self {
            fetcher,
            sink,
            notifier,
        })
    }
}
