//! Job orchestration.
//!
//! One job is an explicit state machine:
//!
//! ```text
//! FetchInput -> Probe -> Plan -> Transcode -> Package -> Upload -> Notify -> Done
//! ```
//!
//! Each stage takes the accumulated [`PipelineState`] and returns the next
//! one. The first error ends the run with a [`StageFailure`]; there is no
//! stage-level retry, the scheduler retries the whole attempt.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use tracing::Instrument;

use rendition_control::CompletionNotice;
use rendition_media::{
    build_package, build_transcode, extract_thumbnail, plan_ladder, probe_video, run_package,
    run_transcode, AudioGroup, Rendition, ToolRunner, TranscodePlan,
};
use rendition_models::{default_candidates, QualityRung, VideoMetadata};

use crate::adapters::{Adapters, Artifact};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    FetchInput,
    Probe,
    Plan,
    Transcode,
    Package,
    Upload,
    Notify,
    Done,
}

impl Stage {
    /// Stage that follows this one; `None` once done.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::FetchInput => Some(Stage::Probe),
            Stage::Probe => Some(Stage::Plan),
            Stage::Plan => Some(Stage::Transcode),
            Stage::Transcode => Some(Stage::Package),
            Stage::Package => Some(Stage::Upload),
            Stage::Upload => Some(Stage::Notify),
            Stage::Notify => Some(Stage::Done),
            Stage::Done => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FetchInput => "fetch_input",
            Stage::Probe => "probe",
            Stage::Plan => "plan",
            Stage::Transcode => "transcode",
            Stage::Package => "package",
            Stage::Upload => "upload",
            Stage::Notify => "notify",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything produced so far by one job.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    /// Stage to run next
    pub stage: Stage,
    pub input: Option<PathBuf>,
    pub metadata: Option<VideoMetadata>,
    pub ladder: Vec<QualityRung>,
    pub thumbnail: Option<PathBuf>,
    pub transcode: Option<TranscodePlan>,
    pub artifacts: Vec<Artifact>,
    /// Keys of the published artifacts
    pub published: Vec<String>,
    /// Whether the completion notice was sent
    pub notified: bool,
}

/// The stage a job failed in, and why.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: WorkerError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for StageFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Runs one job with the given collaborators.
pub struct Pipeline<'a> {
    config: &'a WorkerConfig,
    runner: &'a dyn ToolRunner,
    adapters: Adapters,
    logger: JobLogger,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a WorkerConfig, runner: &'a dyn ToolRunner, adapters: Adapters) -> Self {
        Self {
            config,
            runner,
            adapters,
            logger: JobLogger::new(&config.video_id, config.task_attempt),
        }
    }

    /// Run every stage from `FetchInput` to `Done`, inside the job span.
    pub async fn run(&self) -> Result<PipelineState, StageFailure> {
        self.run_stages()
            .instrument(self.logger.create_span())
            .await
    }

    async fn run_stages(&self) -> Result<PipelineState, StageFailure> {
        let started = Instant::now();
        self.logger.log_start();

        let mut state = PipelineState::default();
        while state.stage != Stage::Done {
            let stage = state.stage;
            let stage_started = Instant::now();
            self.logger.log_stage_start(stage);

            state = match self.step(state).await {
                Ok(next) => next,
                Err(error) => {
                    self.logger.log_failure(stage, &error, error.diagnostics());
                    return Err(StageFailure { stage, error });
                }
            };

            self.logger
                .log_stage_complete(stage, stage_started.elapsed());
        }

        self.logger.log_completion(started.elapsed());
        Ok(state)
    }

    /// Run the current stage and advance.
    pub async fn step(&self, state: PipelineState) -> WorkerResult<PipelineState> {
        let stage = state.stage;
        let mut state = match stage {
            Stage::FetchInput => self.fetch_input(state).await?,
            Stage::Probe => self.probe(state).await?,
            Stage::Plan => self.plan(state)?,
            Stage::Transcode => self.transcode(state).await?,
            Stage::Package => self.package(state).await?,
            Stage::Upload => self.upload(state).await?,
            Stage::Notify => self.notify(state).await?,
            Stage::Done => return Ok(state),
        };
        state.stage = stage.next().unwrap_or(Stage::Done);
        Ok(state)
    }

    async fn fetch_input(&self, mut state: PipelineState) -> WorkerResult<PipelineState> {
        let input = self.config.input_path();
        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(|e| {
                WorkerError::input_fetch(format!(
                    "cannot create {}: {}",
                    self.config.work_dir.display(),
                    e
                ))
            })?;

        self.adapters
            .fetcher
            .fetch(&self.config.video_id, &input)
            .await?;
        state.input = Some(input);
        Ok(state)
    }

    async fn probe(&self, mut state: PipelineState) -> WorkerResult<PipelineState> {
        let input = require(&state.input, Stage::Probe, "an input file")?;
        let metadata = probe_video(self.runner, &self.config.tools, input).await?;
        state.metadata = Some(metadata);
        Ok(state)
    }

    fn plan(&self, mut state: PipelineState) -> WorkerResult<PipelineState> {
        let metadata = require(&state.metadata, Stage::Plan, "source metadata")?;
        state.ladder = plan_ladder(metadata, &default_candidates());
        Ok(state)
    }

    async fn transcode(&self, mut state: PipelineState) -> WorkerResult<PipelineState> {
        let input = require(&state.input, Stage::Transcode, "an input file")?;
        let metadata = require(&state.metadata, Stage::Transcode, "source metadata")?;

        let thumbnail = extract_thumbnail(
            self.runner,
            &self.config.tools,
            input,
            &self.config.work_dir,
        )
        .await;
        if thumbnail.is_none() {
            self.logger
                .log_warning(Stage::Transcode, "no thumbnail, continuing without one");
        }

        let plan = build_transcode(
            &self.config.tools,
            &self.config.encoding,
            metadata,
            input,
            &self.config.work_dir,
            &state.ladder,
        )?;
        run_transcode(self.runner, &plan).await?;

        state.thumbnail = thumbnail;
        state.transcode = Some(plan);
        Ok(state)
    }

    async fn package(&self, mut state: PipelineState) -> WorkerResult<PipelineState> {
        let transcode = require(&state.transcode, Stage::Package, "transcoded renditions")?;
        let out_dir = self.config.output_dir();
        tokio::fs::create_dir_all(&out_dir).await?;

        let plan = build_package(
            &self.config.tools,
            &transcode.renditions,
            &transcode.audio_source,
            &out_dir,
            state.thumbnail.as_deref(),
            &AudioGroup::default(),
        )?;
        run_package(self.runner, &plan).await?;

        state.artifacts = classify_artifacts(plan.artifacts, &transcode.renditions);
        Ok(state)
    }

    async fn upload(&self, mut state: PipelineState) -> WorkerResult<PipelineState> {
        state.published = self
            .adapters
            .sink
            .publish(&self.config.video_id, &state.artifacts)
            .await?;
        Ok(state)
    }

    async fn notify(&self, mut state: PipelineState) -> WorkerResult<PipelineState> {
        let Some(notifier) = &self.adapters.notifier else {
            self.logger
                .log_warning(Stage::Notify, "no callback URL configured, skipped");
            return Ok(state);
        };

        let metadata = require(&state.metadata, Stage::Notify, "source metadata")?;
        let notice = CompletionNotice {
            video_id: self.config.video_id.to_string(),
            duration: metadata.whole_seconds(),
        };
        notifier.notify(&notice).await?;
        state.notified = true;
        Ok(state)
    }
}

fn require<'s, T>(
    value: &'s Option<T>,
    stage: Stage,
    missing: &'static str,
) -> WorkerResult<&'s T> {
    value.as_ref().ok_or(WorkerError::OutOfOrder {
        stage: stage.as_str(),
        missing,
    })
}

/// Tag packaged rendition containers with their rung; everything else is a plain file.
fn classify_artifacts(paths: Vec<PathBuf>, renditions: &[Rendition]) -> Vec<Artifact> {
    paths
        .into_iter()
        .map(|path| {
            let quality = renditions.iter().find(|r| {
                path.file_name()
                    .is_some_and(|name| name == r.rung.packaged_name().as_str())
            });
            match quality {
                Some(r) => Artifact::rendition(path, r.rung.name.clone()),
                None => Artifact::file(path),
            }
        })
        .collect()
}
