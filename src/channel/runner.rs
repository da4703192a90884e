//! Spawning of the local `ssh` and `rsync` processes behind [`SshChannel`].
//!
//! [`SshChannel`]: super::SshChannel

use std::ffi::OsString;
use std::process::{Command, Output};

use super::ChannelError;

/// Exit code and captured text of one local `ssh` or `rsync` process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Stdout, decoded lossily.
    pub stdout: String,
    /// Stderr, decoded lossily.
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the process exited with code zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Seam between [`SshChannel`](super::SshChannel) and process spawning, so
/// tests can script transport results.
pub trait CommandRunner {
    /// Runs `program` to completion and captures its output.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Spawn`] when `program` cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ChannelError>;
}

/// [`CommandRunner`] backed by [`std::process::Command`].
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ChannelError> {
        tracing::debug!(program, arg_count = args.len(), "spawning local process");
        Command::new(program)
            .args(args)
            .output()
            .map(CommandOutput::from)
            .map_err(|err| ChannelError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })
    }
}
