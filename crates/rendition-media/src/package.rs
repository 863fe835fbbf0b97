//! HLS/DASH packaging.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::{ToolCommand, ToolPaths, ToolRunner};
use crate::error::{MediaError, MediaResult};
use crate::transcode::Rendition;

pub const DASH_MANIFEST_NAME: &str = "manifest.mpd";
pub const HLS_MASTER_NAME: &str = "manifest.m3u8";
pub const AUDIO_OUTPUT_NAME: &str = "audio.mp4";
pub const AUDIO_PLAYLIST_NAME: &str = "audio.m3u8";

/// HLS rendition group for the audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioGroup {
    pub group_id: String,
    pub name: String,
}

impl Default for AudioGroup {
    fn default() -> Self {
        Self {
            group_id: "audio".to_string(),
            name: "ENGLISH".to_string(),
        }
    }
}

/// Built packager invocation and the ordered artifacts it yields.
#[derive(Debug, Clone)]
pub struct PackagePlan {
    pub command: ToolCommand,
    /// Everything to publish, in upload order
    pub artifacts: Vec<PathBuf>,
}

/// Build the packager invocation for a transcoded ladder.
///
/// `thumbnail` is listed among the artifacts when present; it is not an input
/// to the packager.
pub fn build_package(
    tools: &ToolPaths,
    renditions: &[Rendition],
    audio_source: &Path,
    out_dir: &Path,
    thumbnail: Option<&Path>,
    audio_group: &AudioGroup,
) -> MediaResult<PackagePlan> {
    if renditions.is_empty() {
        return Err(MediaError::EmptyLadder("package"));
    }

    let audio_output = out_dir.join(AUDIO_OUTPUT_NAME);
    let mpd = out_dir.join(DASH_MANIFEST_NAME);
    let master = out_dir.join(HLS_MASTER_NAME);

    let mut cmd = ToolCommand::new(&tools.packager).arg(format!(
        "in={},stream=audio,output={},playlist_name={},hls_group_id={},hls_name={}",
        audio_source.display(),
        audio_output.display(),
        AUDIO_PLAYLIST_NAME,
        audio_group.group_id,
        audio_group.name,
    ));

    for rendition in renditions {
        let rung = &rendition.rung;
        cmd = cmd.arg(format!(
            "in={},stream=video,output={},playlist_name={},iframe_playlist_name={}",
            rendition.path.display(),
            out_dir.join(rung.packaged_name()).display(),
            rung.playlist_name(),
            rung.iframe_playlist_name(),
        ));
    }

    cmd = cmd
        .arg("--hls_master_playlist_output")
        .path_arg(&master)
        .arg("--mpd_output")
        .path_arg(&mpd);

    // Everything but the thumbnail is written by the packager.
    let mut packaged = vec![mpd, master, audio_output, out_dir.join(AUDIO_PLAYLIST_NAME)];
    packaged.extend(renditions.iter().map(|r| out_dir.join(r.rung.packaged_name())));
    packaged.extend(renditions.iter().map(|r| out_dir.join(r.rung.playlist_name())));
    packaged.extend(
        renditions
            .iter()
            .map(|r| out_dir.join(r.rung.iframe_playlist_name())),
    );
    for path in &packaged {
        cmd = cmd.expect_output(path);
    }

    let mut artifacts = packaged;
    if let Some(thumb) = thumbnail {
        artifacts.insert(2, thumb.to_path_buf());
    }

    // Playlist names resolve next to the master playlist.
    Ok(PackagePlan {
        command: cmd,
        artifacts,
    })
}

/// Run the packager.
pub async fn run_package<R: ToolRunner + ?Sized>(
    runner: &R,
    plan: &PackagePlan,
) -> MediaResult<()> {
    info!("Packaging: {}", plan.command.display());

    let output = runner.run(&plan.command).await?;
    if !output.success() {
        warn!("Packager failed with exit code {:?}", output.exit_code);
        return Err(MediaError::PackagingFailed {
            stderr: output.stderr,
            exit_code: output.exit_code,
        });
    }

    output.ensure_outputs(&plan.command)?;
    info!("Packaging complete, {} artifacts", plan.artifacts.len());
    Ok(())
}
