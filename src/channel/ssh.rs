//! SSH-backed channel that shells out to the system `ssh` and `rsync`.
//!
//! Commands run through `ssh user@host <command>`. Directory uploads use
//! `rsync -az` with the same SSH options passed through `--rsh`, and generated
//! files are staged in a local temporary file before being sent the same way.

use std::ffi::OsString;
use std::io::Write;

use camino::Utf8Path;
use tempfile::NamedTempFile;

use super::{
    ChannelError, ChannelFuture, CommandOutput, CommandRunner, ProcessCommandRunner,
    RemoteChannel, RemoteCommandOutput, SshConfig, expand_tilde,
};

/// Exit status `ssh` reserves for its own failures.
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// Remote channel speaking to the target over SSH.
#[derive(Clone, Debug)]
pub struct SshChannel<R: CommandRunner> {
    config: SshConfig,
    runner: R,
}

impl SshChannel<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidConfig`] when validation fails.
    pub fn with_process_runner(config: SshConfig) -> Result<Self, ChannelError> {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SshChannel<R> {
    /// Creates a new channel using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidConfig`] when configuration validation
    /// fails.
    pub fn new(config: SshConfig, runner: R) -> Result<Self, ChannelError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Returns a reference to the underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &SshConfig {
        &self.config
    }

    fn run_ssh(&self, command: &str) -> Result<RemoteCommandOutput, ChannelError> {
        let args = self.build_ssh_args(command);
        let output = self.runner.run(&self.config.ssh_bin, &args)?;
        if output.code == Some(SSH_TRANSPORT_FAILURE) {
            return Err(ChannelError::Connection {
                login: self.config.login(),
                stderr: output.stderr,
            });
        }

        Ok(RemoteCommandOutput {
            exit_code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn upload_bytes(&self, remote_path: &str, contents: &[u8]) -> Result<(), ChannelError> {
        let staging_error = |err: std::io::Error| ChannelError::Staging {
            remote_path: remote_path.to_owned(),
            message: err.to_string(),
        };
        let mut staged = NamedTempFile::new().map_err(staging_error)?;
        staged.write_all(contents).map_err(staging_error)?;
        staged.flush().map_err(staging_error)?;

        let source = staged.path().as_os_str().to_owned();
        let args = self.build_rsync_args(source, remote_path);
        self.run_rsync(&args)
    }

    fn upload_tree(&self, remote_path: &str, local_dir: &Utf8Path) -> Result<(), ChannelError> {
        if !local_dir.is_dir() {
            return Err(ChannelError::MissingSource {
                path: local_dir.to_path_buf(),
            });
        }

        let source = OsString::from(format!("{}/", local_dir.as_str().trim_end_matches('/')));
        let args = self.build_rsync_args(source, remote_path);
        self.run_rsync(&args)
    }

    fn run_rsync(&self, args: &[OsString]) -> Result<(), ChannelError> {
        let output = self.runner.run(&self.config.rsync_bin, args)?;
        if output.is_success() {
            return Ok(());
        }
        Err(command_failure(&self.config.rsync_bin, output))
    }

    fn build_rsync_args(&self, source: OsString, remote_path: &str) -> Vec<OsString> {
        vec![
            OsString::from("-az"),
            OsString::from("--rsh"),
            OsString::from(self.build_remote_shell()),
            source,
            OsString::from(format!("{}:{remote_path}", self.config.login())),
        ]
    }

    fn build_ssh_args(&self, remote_command: &str) -> Vec<OsString> {
        let mut args = self.common_ssh_options();
        args.push(OsString::from(self.config.login()));
        args.push(OsString::from(remote_command));
        args
    }

    fn common_ssh_options(&self) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(self.config.port.to_string()),
        ];

        if let Some(ref identity_file) = self.config.identity_file {
            args.push(OsString::from("-i"));
            args.push(OsString::from(expand_tilde(identity_file)));
        }

        if self.config.batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }

        if !self.config.strict_host_key_checking {
            args.push(OsString::from("-o"));
            args.push(OsString::from("StrictHostKeyChecking=no"));
        }

        if !self.config.known_hosts_file.trim().is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!(
                "UserKnownHostsFile={}",
                self.config.known_hosts_file
            )));
        }

        if self.config.connect_timeout_secs > 0 {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!(
                "ConnectTimeout={}",
                self.config.connect_timeout_secs
            )));
        }

        args
    }

    fn build_remote_shell(&self) -> String {
        let opts = self
            .common_ssh_options()
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} {}", self.config.ssh_bin, opts)
    }
}

fn command_failure(program: &str, output: CommandOutput) -> ChannelError {
    let status_text = output
        .code
        .map_or_else(|| String::from("unknown"), |code| code.to_string());
    ChannelError::CommandFailure {
        program: program.to_owned(),
        status: output.code,
        status_text,
        stderr: output.stderr,
    }
}

impl<R: CommandRunner + Sync> RemoteChannel for SshChannel<R> {
    fn connection_type(&self) -> &str {
        "ssh"
    }

    fn execute<'a>(&'a self, command: &'a str) -> ChannelFuture<'a, RemoteCommandOutput> {
        Box::pin(async move { self.run_ssh(command) })
    }

    fn upload<'a>(&'a self, remote_path: &'a str, contents: &'a [u8]) -> ChannelFuture<'a, ()> {
        Box::pin(async move { self.upload_bytes(remote_path, contents) })
    }

    fn upload_dir<'a>(
        &'a self,
        remote_path: &'a str,
        local_dir: &'a Utf8Path,
    ) -> ChannelFuture<'a, ()> {
        Box::pin(async move { self.upload_tree(remote_path, local_dir) })
    }
}
