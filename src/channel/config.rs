//! SSH connection settings and channel errors.
//!
//! [`SshConfig`] is loaded via `ortho-config`, which merges defaults,
//! configuration files, and environment variables. CLI flags are applied on
//! top by the binary.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// SSH and rsync settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SOLO_SSH",
    discovery(
        app_name = "solo-bootstrap",
        env_var = "SOLO_BOOTSTRAP_CONFIG_PATH",
        config_file_name = "solo-bootstrap.toml",
        dotfile_name = ".solo-bootstrap.toml",
        project_file_name = "solo-bootstrap.toml"
    )
)]
pub struct SshConfig {
    /// Hostname or IP address of the target machine.
    pub host: Option<String>,
    /// Remote user to connect as.
    #[ortho_config(default = "root".to_owned())]
    pub user: String,
    /// SSH port exposed by the target.
    #[ortho_config(default = DEFAULT_SSH_PORT)]
    pub port: u16,
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `rsync` executable.
    #[ortho_config(default = "rsync".to_owned())]
    pub rsync_bin: String,
    /// Whether to force batch mode for SSH to avoid password prompts.
    #[ortho_config(default = true)]
    pub batch_mode: bool,
    /// Whether to enforce host key checking; disabled by default because
    /// bootstrap targets are usually freshly created.
    #[ortho_config(default = false)]
    pub strict_host_key_checking: bool,
    /// Known hosts file override; defaults to `/dev/null`.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub known_hosts_file: String,
    /// Path to the SSH private key. Supports `~/` expansion. When unset, SSH
    /// falls back to its default key locations.
    pub identity_file: Option<String>,
    /// Seconds SSH waits for the TCP connection before giving up. Zero
    /// leaves the SSH client default in place.
    #[ortho_config(default = 30)]
    pub connect_timeout_secs: u32,
}

/// Errors raised when loading the SSH configuration from layered sources.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SshConfigLoadError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("ssh configuration parsing failed: {0}")]
    Parse(String),
}

impl SshConfig {
    /// Loads configuration using defaults, configuration files, and
    /// environment variables without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`SshConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, SshConfigLoadError> {
        Self::load_from_iter([std::ffi::OsString::from("solo-bootstrap")])
            .map_err(|err| SshConfigLoadError::Parse(err.to_string()))
    }

    /// Ensures required values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidConfig`] when any required field is
    /// empty or the port is zero.
    pub fn validate(&self) -> Result<(), ChannelError> {
        Self::require_value(self.host.as_deref().unwrap_or_default(), "host")?;
        Self::require_value(&self.user, "user")?;
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.rsync_bin, "rsync_bin")?;
        Self::require_optional_value(self.identity_file.as_deref(), "identity_file")?;
        if self.port == 0 {
            return Err(ChannelError::InvalidConfig {
                field: String::from("port"),
            });
        }
        Ok(())
    }

    /// Returns the `user@host` login used by `ssh` and `rsync`.
    #[must_use]
    pub fn login(&self) -> String {
        format!("{}@{}", self.user, self.host.as_deref().unwrap_or_default())
    }

    fn require_value(value: &str, field: &str) -> Result<(), ChannelError> {
        Self::require_optional_value(Some(value), field)
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), ChannelError> {
        match value {
            None => Ok(()),
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(ChannelError::InvalidConfig {
                field: field.to_owned(),
            }),
        }
    }
}

/// Errors surfaced by a remote channel.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ChannelError {
    /// Raised when configuration is missing required values.
    #[error("missing {field}: set SOLO_SSH_{env_suffix} or add {field} to solo-bootstrap.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when a local directory selected for upload does not exist.
    #[error("upload source directory missing: {path}")]
    MissingSource {
        /// Path that was expected to be uploaded.
        path: Utf8PathBuf,
    },
    /// Raised when generated content cannot be staged locally for upload.
    #[error("failed to stage upload for {remote_path}: {message}")]
    Staging {
        /// Remote destination of the upload.
        remote_path: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the SSH transport itself fails (ssh exit status 255),
    /// covering refused connections and connect timeouts.
    #[error("connection to {login} failed: {stderr}")]
    Connection {
        /// `user@host` that could not be reached.
        login: String,
        /// Stderr captured from the SSH client.
        stderr: String,
    },
    /// Raised when a transfer tool completes with a non-zero exit code.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Command name used for the attempted operation.
        program: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
}
