//! External diagnostic command execution.
//!
//! Provides a trait-based abstraction over process execution to enable:
//! - Testing the resolver and engine without spawning processes
//! - Prompt cancellation: dropping an in-flight call kills the child

use std::future::Future;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::CommandError;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, split into lines.
    pub lines: Vec<String>,
    /// Exit code, `None` when the process was killed by a signal.
    pub status: Option<i32>,
}

impl CommandOutput {
    /// Build an output from raw stdout bytes.
    pub fn from_stdout(stdout: &[u8], status: Option<i32>) -> Self {
        let lines = String::from_utf8_lossy(stdout)
            .lines()
            .map(str::to_owned)
            .collect();
        Self { lines, status }
    }

    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }

    /// Keep the output only if the command exited successfully.
    pub fn require_success(self, program: &str) -> Result<Self, CommandError> {
        if self.success() {
            Ok(self)
        } else {
            Err(CommandError::Failed {
                program: program.to_owned(),
                status: self.status,
            })
        }
    }
}

/// Trait for running external commands.
///
/// Implementations block the calling task (not the runtime) until the
/// command exits or `timeout` elapses.
pub trait CommandRunner: Send + Sync + Clone + 'static {
    /// Run `program` with `args` and capture its standard output.
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> impl Future<Output = Result<CommandOutput, CommandError>> + Send;
}

/// Production runner spawning real processes with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub const fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        if program.is_empty() {
            return Err(CommandError::NotFound {
                program: String::new(),
            });
        }

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => CommandError::NotFound {
                    program: program.to_owned(),
                },
                _ => CommandError::Spawn {
                    program: program.to_owned(),
                    source,
                },
            })?;

        // The child moves into the wait future; on timeout it is dropped and killed.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| CommandError::Timeout {
                program: program.to_owned(),
                timeout,
            })?
            .map_err(|source| CommandError::Spawn {
                program: program.to_owned(),
                source,
            })?;

        Ok(CommandOutput::from_stdout(&output.stdout, output.status.code()))
    }
}
