//! External tool invocation.
//!
//! Every call to FFmpeg, FFprobe or the packager is described by a
//! [`ToolCommand`] (program, argument vector, files it is expected to
//! produce) and answered by a [`ToolOutput`] (exit status, captured streams,
//! files that actually exist afterwards). Arguments are passed straight to the
//! process; no shell is involved.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Locations of the external binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub packager: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            packager: PathBuf::from("packager"),
        }
    }
}

impl ToolPaths {
    /// Resolve every tool, failing on the first one that cannot be found.
    pub fn check(&self) -> MediaResult<()> {
        for tool in [&self.ffmpeg, &self.ffprobe, &self.packager] {
            which::which(tool)
                .map_err(|_| MediaError::ToolNotFound(tool.display().to_string()))?;
        }
        Ok(())
    }
}

/// Typed request for one external process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    expected_outputs: Vec<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            expected_outputs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Path argument, converted losslessly where possible.
    pub fn path_arg(self, path: impl AsRef<Path>) -> Self {
        let arg = path.as_ref().to_string_lossy().into_owned();
        self.arg(arg)
    }

    /// Declare a file the command must produce on success.
    pub fn expect_output(mut self, path: impl AsRef<Path>) -> Self {
        self.expected_outputs.push(path.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn expected_outputs(&self) -> &[PathBuf] {
        &self.expected_outputs
    }

    /// Short program name for log lines and errors.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Printable form of the invocation (for logs only, never executed).
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Typed result of one external process run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Expected outputs that exist after the run
    pub produced: Vec<PathBuf>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Expected outputs the command did not produce.
    pub fn missing_outputs<'a>(&self, cmd: &'a ToolCommand) -> Vec<&'a Path> {
        cmd.expected_outputs()
            .iter()
            .filter(|p| !self.produced.contains(p))
            .map(PathBuf::as_path)
            .collect()
    }

    /// Fail with [`MediaError::MissingOutput`] for the first absent output.
    pub fn ensure_outputs(&self, cmd: &ToolCommand) -> MediaResult<()> {
        match self.missing_outputs(cmd).first() {
            Some(path) => Err(MediaError::MissingOutput {
                program: cmd.program_name(),
                path: path.to_path_buf(),
            }),
            None => Ok(()),
        }
    }
}

/// Executes tool commands.
///
/// Implementations report the exit status in [`ToolOutput`]; only failures to
/// run the process at all (missing binary, timeout) are returned as errors.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, cmd: &ToolCommand) -> MediaResult<ToolOutput>;
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the tool if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, cmd: &ToolCommand) -> MediaResult<ToolOutput> {
        debug!("Running: {}", cmd.display());

        let mut command = Command::new(cmd.program());
        command
            .args(cmd.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MediaError::ToolNotFound(cmd.program().display().to_string())
            } else {
                MediaError::Spawn {
                    program: cmd.program_name(),
                    source: e,
                }
            }
        })?;

        // Dropping the future on timeout kills the child (kill_on_drop).
        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(
                        "{} timed out after {} seconds, killing process",
                        cmd.program_name(),
                        timeout.as_secs()
                    );
                    return Err(MediaError::Timeout(timeout.as_secs()));
                }
            },
            None => child.wait_with_output().await?,
        };

        let mut produced = Vec::new();
        for path in cmd.expected_outputs() {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                produced.push(path.clone());
            }
        }

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            produced,
        })
    }
}
