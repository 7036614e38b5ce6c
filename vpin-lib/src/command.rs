//! External process execution.
//!
//! The decoder is an opaque subprocess; everything the core needs from it
//! is captured by [`CommandOutput`]. A non-zero exit code is not an error
//! at this layer, and a timeout is reported through `timed_out` rather
//! than an `Err`.

use std::io;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::time::Duration;

/// Collected result of one external command invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Exit code 0, nothing on stderr, finished in time.
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == 0 && self.stderr.trim().is_empty()
    }
}

/// Executes an external program and collects its output.
///
/// `Err` is reserved for spawn failures (missing executable, permission);
/// anything the child itself does wrong shows up in the output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        cmd: &Path,
        args: &[String],
        working_dir: &Path,
        timeout: Duration,
    ) -> io::Result<CommandOutput>;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        cmd: &Path,
        args: &[String],
        working_dir: &Path,
        timeout: Duration,
    ) -> io::Result<CommandOutput> {
        let child = tokio::process::Command::new(cmd)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(CommandOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code().unwrap_or(-1),
                    timed_out: false,
                })
            }
            // Timeout drops the future; kill_on_drop reaps the child.
            Err(_) => Ok(CommandOutput { timed_out: true, ..Default::default() }),
        }
    }
}
