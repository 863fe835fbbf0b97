//! Thumbnail extraction.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use rendition_models::encoding::{
    THUMBNAIL_FILE_NAME, THUMBNAIL_HEIGHT, THUMBNAIL_TIMESTAMP, THUMBNAIL_WIDTH,
};

use crate::command::{ToolCommand, ToolPaths, ToolRunner};

/// Build the single-frame extraction command.
pub fn thumbnail_command(tools: &ToolPaths, input: &Path, work_dir: &Path) -> ToolCommand {
    let output = work_dir.join(THUMBNAIL_FILE_NAME);
    ToolCommand::new(&tools.ffmpeg)
        .args(["-y", "-v", "error", "-i"])
        .path_arg(input)
        .args(["-ss", THUMBNAIL_TIMESTAMP, "-vframes", "1", "-vf"])
        .arg(format!("scale={}:{}", THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT))
        .path_arg(&output)
        .expect_output(&output)
}

/// Extract a thumbnail, best effort.
///
/// Returns the thumbnail path only if it was written; any failure is logged
/// and swallowed.
pub async fn extract_thumbnail<R: ToolRunner + ?Sized>(
    runner: &R,
    tools: &ToolPaths,
    input: &Path,
    work_dir: &Path,
) -> Option<PathBuf> {
    let cmd = thumbnail_command(tools, input, work_dir);

    match runner.run(&cmd).await {
        Ok(output) if output.success() && output.missing_outputs(&cmd).is_empty() => {
            let path = work_dir.join(THUMBNAIL_FILE_NAME);
            info!("Thumbnail written to {}", path.display());
            Some(path)
        }
        Ok(output) => {
            warn!(
                "Thumbnail extraction failed (exit code {:?}): {}",
                output.exit_code,
                output.stderr.trim()
            );
            None
        }
        Err(e) => {
            warn!("Thumbnail extraction failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ToolOutput;
    use crate::error::{MediaError, MediaResult};
    use async_trait::async_trait;

    enum Outcome {
        Output(ToolOutput),
        NotFound,
    }

    struct StubRunner(Outcome);

    #[async_trait]
    impl ToolRunner for StubRunner {
        async fn run(&self, _cmd: &ToolCommand) -> MediaResult<ToolOutput> {
            match &self.0 {
                Outcome::Output(out) => Ok(out.clone()),
                Outcome::NotFound => Err(MediaError::ToolNotFound("ffmpeg".to_string())),
            }
        }
    }

    #[test]
    fn test_thumbnail_command() {
        let cmd = thumbnail_command(&ToolPaths::default(), Path::new("in.mp4"), Path::new("/w"));
        assert_eq!(
            cmd.get_args().join(" "),
            "-y -v error -i in.mp4 -ss 00:00:01.000 -vframes 1 -vf scale=320:180 /w/thumbnail.jpg"
        );
    }

    #[tokio::test]
    async fn test_thumbnail_success() {
        let runner = StubRunner(Outcome::Output(ToolOutput {
            exit_code: Some(0),
            produced: vec![PathBuf::from("/w/thumbnail.jpg")],
            ..Default::default()
        }));
        let thumb =
            extract_thumbnail(&runner, &ToolPaths::default(), Path::new("in.mp4"), Path::new("/w"))
                .await;
        assert_eq!(thumb, Some(PathBuf::from("/w/thumbnail.jpg")));
    }

    #[tokio::test]
    async fn test_thumbnail_failure_is_swallowed() {
        let short_clip = StubRunner(Outcome::Output(ToolOutput {
            exit_code: Some(0),
            ..Default::default()
        }));
        let missing_tool = StubRunner(Outcome::NotFound);

        for runner in [short_clip, missing_tool] {
            let thumb = extract_thumbnail(
                &runner,
                &ToolPaths::default(),
                Path::new("in.mp4"),
                Path::new("/w"),
            )
            .await;
            assert_eq!(thumb, None);
        }
    }
}
