//! Multi-output transcode.
//!
//! One FFmpeg run decodes the source once and writes every rung of the ladder
//! (plus, for the shared layout, an audio-only track).

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use rendition_models::{AudioLayout, EncodingConfig, QualityRung, VideoMetadata};

use crate::command::{ToolCommand, ToolPaths, ToolRunner};
use crate::error::{MediaError, MediaResult};

/// File name of the shared audio-only intermediate.
pub const AUDIO_TRACK_FILE_NAME: &str = "audio_track.mp4";

/// A rung together with the file it is encoded into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    pub rung: QualityRung,
    pub path: PathBuf,
}

/// Built transcode invocation and the files it will produce.
#[derive(Debug, Clone)]
pub struct TranscodePlan {
    pub command: ToolCommand,
    /// One entry per ladder rung, in ladder order
    pub renditions: Vec<Rendition>,
    /// Where the packager takes audio from
    pub audio_source: PathBuf,
}

/// Build the single FFmpeg invocation for the whole ladder.
pub fn build_transcode(
    tools: &ToolPaths,
    config: &EncodingConfig,
    source: &VideoMetadata,
    input: &Path,
    work_dir: &Path,
    ladder: &[QualityRung],
) -> MediaResult<TranscodePlan> {
    if ladder.is_empty() {
        return Err(MediaError::EmptyLadder("transcode"));
    }

    let mut cmd = ToolCommand::new(&tools.ffmpeg)
        .args(["-y", "-v", "error", "-i"])
        .path_arg(input);

    let video_args = config.to_ffmpeg_video_args(source.frame_rate());
    let mut renditions = Vec::with_capacity(ladder.len());

    for rung in ladder {
        let path = rung.rendition_path(work_dir);
        cmd = cmd.args(["-vf".to_string(), rung.scale_filter()]);
        cmd = cmd.args(video_args.iter().cloned());
        cmd = match config.audio_layout {
            AudioLayout::SharedTrack => cmd.arg("-an"),
            AudioLayout::PerRung => {
                let bitrate = rung.audio_bitrate.as_deref().unwrap_or(&config.audio_bitrate);
                cmd.args(config.to_ffmpeg_audio_args(bitrate))
            }
        };
        cmd = cmd.path_arg(&path).expect_output(&path);
        renditions.push(Rendition {
            rung: rung.clone(),
            path,
        });
    }

    let audio_source = match config.audio_layout {
        AudioLayout::SharedTrack => {
            let track = work_dir.join(AUDIO_TRACK_FILE_NAME);
            cmd = cmd
                .arg("-vn")
                .args(config.to_ffmpeg_audio_args(&config.audio_bitrate))
                .args(["-map_metadata", "-1"])
                .path_arg(&track)
                .expect_output(&track);
            track
        }
        // Non-empty ladder checked above; the top rung carries audio.
        AudioLayout::PerRung => renditions[0].path.clone(),
    };

    Ok(TranscodePlan {
        command: cmd,
        renditions,
        audio_source,
    })
}

/// Run a transcode plan and verify every rendition was written.
pub async fn run_transcode<R: ToolRunner + ?Sized>(
    runner: &R,
    plan: &TranscodePlan,
) -> MediaResult<()> {
    info!(
        "Transcoding {} renditions: {}",
        plan.renditions.len(),
        plan.command.display()
    );

    let output = runner.run(&plan.command).await?;
    if !output.success() {
        warn!("FFmpeg failed with exit code {:?}", output.exit_code);
        return Err(MediaError::TranscodeFailed {
            stderr: output.stderr,
            exit_code: output.exit_code,
        });
    }

    output.ensure_outputs(&plan.command)?;
    info!("Transcode complete");
    Ok(())
}
