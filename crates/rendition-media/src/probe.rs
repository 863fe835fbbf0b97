//! FFprobe video information.

use std::path::Path;
use tracing::{debug, info};

use rendition_models::VideoMetadata;

use crate::command::{ToolCommand, ToolPaths, ToolRunner};
use crate::error::{MediaError, MediaResult};

/// Build the probe invocation.
///
/// The output is four bare lines, in this order: width, height, frame rate
/// (`num/den`), duration in seconds.
pub fn probe_command(tools: &ToolPaths, input: &Path) -> ToolCommand {
    ToolCommand::new(&tools.ffprobe)
        .args(["-v", "error"])
        .args(["-select_streams", "v:0"])
        .args(["-show_entries", "stream=width,height,r_frame_rate"])
        .args(["-show_entries", "format=duration"])
        .args(["-of", "default=noprint_wrappers=1:nokey=1"])
        .path_arg(input)
}

/// Probe a video file for the metadata the ladder needs.
pub async fn probe_video<R: ToolRunner + ?Sized>(
    runner: &R,
    tools: &ToolPaths,
    input: &Path,
) -> MediaResult<VideoMetadata> {
    if !tokio::fs::try_exists(input).await.unwrap_or(false) {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let cmd = probe_command(tools, input);
    let output = runner.run(&cmd).await?;

    if !output.success() {
        return Err(MediaError::ProbeFailed {
            message: format!("ffprobe exited with {:?}", output.exit_code),
            stderr: Some(output.stderr),
        });
    }

    debug!("ffprobe output: {:?}", output.stdout);
    let metadata = parse_probe_output(&output.stdout)?;
    info!("Probed {}: {}", input.display(), metadata);
    Ok(metadata)
}

/// Parse the fixed-order probe output.
pub fn parse_probe_output(stdout: &str) -> MediaResult<VideoMetadata> {
    let lines: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let line = |index: usize, what: &str| -> MediaResult<&str> {
        lines
            .get(index)
            .copied()
            .ok_or_else(|| MediaError::probe_parse(format!("missing {} (line {})", what, index)))
    };

    let width = parse_integer(line(0, "width")?, "width")?;
    let height = parse_integer(line(1, "height")?, "height")?;
    let frame_rate = parse_frame_rate(line(2, "frame rate")?)?;
    let duration = line(3, "duration")?;
    let duration: f64 = duration
        .parse()
        .map_err(|_| MediaError::probe_parse(format!("duration is not a number: {:?}", duration)))?;

    VideoMetadata::new(width, height, frame_rate, duration)
        .map_err(|e| MediaError::probe_parse(e.to_string()))
}

fn parse_integer(value: &str, what: &str) -> MediaResult<u32> {
    value
        .parse()
        .map_err(|_| MediaError::probe_parse(format!("{} is not a positive integer: {:?}", what, value)))
}

/// Frame rate as reported by `r_frame_rate`: the numerator before `/`,
/// truncated to an integer.
fn parse_frame_rate(value: &str) -> MediaResult<u32> {
    let numerator = value.split_once('/').map_or(value, |(num, _)| num).trim();
    let rate: f64 = numerator
        .parse()
        .map_err(|_| MediaError::probe_parse(format!("frame rate is not numeric: {:?}", value)))?;
    if !rate.is_finite() || rate < 1.0 {
        return Err(MediaError::probe_parse(format!(
            "frame rate must be positive: {:?}",
            value
        )));
    }
    Ok(rate.trunc() as u32)
}
