//! Remote execution channel used to reach the bootstrap target.
//!
//! The orchestrator only needs three primitives from the target: run a
//! command, upload a generated file, and upload a local directory tree.
//! [`RemoteChannel`] captures those so the sequence can be driven against a
//! scripted double in tests and against [`SshChannel`] in production.

use std::future::Future;
use std::pin::Pin;

use camino::Utf8Path;

mod config;
mod runner;
mod ssh;
mod util;

pub use config::{ChannelError, DEFAULT_SSH_PORT, SshConfig, SshConfigLoadError};
pub use runner::{CommandOutput, CommandRunner, ProcessCommandRunner};
pub use ssh::SshChannel;
pub use util::expand_tilde;

/// Output captured from a command executed on the target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCommandOutput {
    /// Exit code reported by the remote command, if any.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl RemoteCommandOutput {
    /// Returns `true` when the remote command exited with status zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    /// Human readable exit status, `unknown` when the command was killed.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.exit_code
            .map_or_else(|| String::from("unknown"), |code| code.to_string())
    }
}

/// Future returned by channel operations.
pub type ChannelFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ChannelError>> + Send + 'a>>;

/// Minimal interface a bootstrap target must expose.
///
/// Remote paths always use forward slashes, whatever the target OS.
pub trait RemoteChannel {
    /// Transport name (`ssh`, `winrm`) used to infer the guest OS.
    fn connection_type(&self) -> &str;

    /// Runs `command` on the target and returns its output. A non-zero exit
    /// is reported through [`RemoteCommandOutput::exit_code`], not as an
    /// error.
    fn execute<'a>(&'a self, command: &'a str) -> ChannelFuture<'a, RemoteCommandOutput>;

    /// Writes `contents` to `remote_path` on the target.
    fn upload<'a>(&'a self, remote_path: &'a str, contents: &'a [u8]) -> ChannelFuture<'a, ()>;

    /// Recursively uploads `local_dir` so that its contents land directly
    /// under `remote_path`, preserving relative structure.
    fn upload_dir<'a>(
        &'a self,
        remote_path: &'a str,
        local_dir: &'a Utf8Path,
    ) -> ChannelFuture<'a, ()>;
}

#[cfg(test)]
mod tests;
