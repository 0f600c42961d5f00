//! Shell command execution behind a narrow capability trait.
//!
//! This module defines the [`CommandExecutor`] trait, the single seam through
//! which every orchestrator reaches the outside world. An executor is handed
//! a complete command string and returns the captured output together with
//! the exit code. It never fails on a nonzero exit, because the callers own
//! the interpretation of tool-specific exit conventions (`simctl` in
//! particular reuses the same codes for several distinct conditions).
//!
//! The production implementation is [`ShellExecutor`], which runs commands
//! through `/bin/sh -c` with a wall-clock timeout and a bounded output
//! buffer. A timeout is surfaced as an ordinary failed [`CommandOutput`]
//! (with [`CommandOutput::timed_out`] set), not as a distinct error: the
//! parsers further up decide whether the stderr content makes it actionable.
//!
//! # Example
//!
//! ```no_run
//! use xcforge_core::exec::{CommandExecutor, ExecOptions, ShellExecutor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = ShellExecutor;
//!     let output = executor
//!         .run("xcrun simctl list devices --json", &ExecOptions::default())
//!         .await
//!         .unwrap();
//!     println!("exit: {:?}", output.exit_code);
//! }
//! ```

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

/// Default wall-clock budget for a single command.
///
/// Builds and test runs can legitimately take minutes; simulator control
/// commands normally finish in seconds but `simctl boot` blocks until the
/// device reaches its target state.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default cap on captured bytes per stream (stdout and stderr separately).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// Errors that can occur when launching a command.
///
/// Note the narrow surface: a command that *runs* and exits nonzero is not
/// an error; that information lives in [`CommandOutput::exit_code`].
#[derive(Error, Debug)]
pub enum ExecError {
    /// The shell process could not be spawned at all.
    #[error("failed to spawn shell: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Per-command execution limits.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Maximum wall-clock time before the process is killed.
    pub timeout: Duration,
    /// Maximum bytes captured per output stream; the rest is drained and
    /// discarded so the child never blocks on a full pipe.
    pub max_output_bytes: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ExecOptions {
    /// Options with a specific timeout in seconds, keeping the default
    /// output cap.
    pub fn with_timeout_secs(secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(secs),
            ..Self::default()
        }
    }
}

/// Captured result of one command invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Captured stdout, lossily decoded as UTF-8, truncated at the cap.
    pub stdout: String,
    /// Captured stderr, lossily decoded as UTF-8, truncated at the cap.
    pub stderr: String,
    /// The process exit code. `None` when the process was killed by a
    /// signal or by the timeout.
    pub exit_code: Option<i32>,
    /// True when the process was killed because it exceeded the timeout.
    pub timed_out: bool,
}

impl CommandOutput {
    /// True only for a clean zero exit within the time budget.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

/// Capability to run a shell command and observe its outcome.
///
/// Implementations must return `Ok` with the captured output for any
/// command that could be spawned, regardless of its exit status. The only
/// `Err` case is a spawn failure.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` through a shell and capture its output.
    async fn run(&self, command: &str, options: &ExecOptions) -> Result<CommandOutput, ExecError>;
}

/// Production executor: `/bin/sh -c` via `tokio::process`.
pub struct ShellExecutor;

/// Read a stream up to `cap` bytes, then drain the remainder so the child
/// process never stalls on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(mut stream: R, cap: usize) -> String {
    let mut buf = Vec::with_capacity(cap.min(64 * 1024));
    let mut limited = (&mut stream).take(cap as u64);
    let _ = limited.read_to_end(&mut buf).await;
    let _ = tokio::io::copy(&mut stream, &mut tokio::io::sink()).await;
    String::from_utf8_lossy(&buf).into_owned()
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run(&self, command: &str, options: &ExecOptions) -> Result<CommandOutput, ExecError> {
        debug!(command, timeout_secs = options.timeout.as_secs(), "spawning shell command");

        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Both pipes are read concurrently with the wait; a child that
        // fills one pipe while we block on the other would deadlock.
        let stdout_pipe = child.stdout.take().expect("stdout was piped");
        let stderr_pipe = child.stderr.take().expect("stderr was piped");
        let cap = options.max_output_bytes;
        let stdout_task = tokio::spawn(read_capped(stdout_pipe, cap));
        let stderr_task = tokio::spawn(read_capped(stderr_pipe, cap));

        let status = match tokio::time::timeout(options.timeout, child.wait()).await {
            Ok(status) => Some(status?),
            Err(_) => {
                let _ = child.kill().await;
                let _ = child.wait().await;
                None
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let mut stderr = stderr_task.await.unwrap_or_default();

        let timed_out = status.is_none();
        if timed_out {
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&format!(
                "command timed out after {} seconds",
                options.timeout.as_secs()
            ));
        }

        let output = CommandOutput {
            stdout,
            stderr,
            exit_code: status.and_then(|s| s.code()),
            timed_out,
        };
        debug!(exit_code = ?output.exit_code, timed_out, "command finished");
        Ok(output)
    }
}
