//! Error types for the bootstrap sequence.

use thiserror::Error;

use crate::channel::ChannelError;
use crate::config::ConfigError;

/// Raised when a command or `solo.rb` template cannot be rendered.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("error rendering {name} template: {message}")]
pub struct TemplateError {
    /// Which template failed, for example `install_command`.
    pub name: String,
    /// Renderer diagnostic.
    pub message: String,
}

impl TemplateError {
    pub(crate) fn new(name: &str, err: &impl std::fmt::Display) -> Self {
        Self {
            name: name.to_owned(),
            message: err.to_string(),
        }
    }
}

/// Failure of a single remote command.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RemoteError {
    /// The channel could not deliver the command.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// The command ran and exited unsuccessfully.
    #[error("command `{command}` exited with status {status_text}: {stderr}")]
    NonZeroExit {
        /// Command as sent to the target.
        command: String,
        /// Exit code, when the channel reported one.
        status: Option<i32>,
        /// Printable exit status.
        status_text: String,
        /// Captured stderr, trimmed.
        stderr: String,
    },
}

/// Errors raised while bootstrapping a target.
///
/// Each variant names the step that failed; nothing after that step runs.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Settings could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A template could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// The staging directory could not be created.
    #[error("error creating staging directory {path}: {source}")]
    CreateDir {
        /// Remote staging directory.
        path: String,
        /// Underlying failure.
        source: RemoteError,
    },
    /// A cookbook directory failed to upload.
    #[error("error uploading cookbooks from {local_path}: {source}")]
    UploadCookbooks {
        /// Local cookbook directory.
        local_path: String,
        /// Underlying failure.
        source: ChannelError,
    },
    /// Node attributes could not be serialised.
    #[error("error creating JSON attributes: {0}")]
    EncodeAttributes(#[source] serde_json::Error),
    /// `attributes.json` failed to upload.
    #[error("error uploading JSON attributes: {0}")]
    UploadAttributes(#[source] ChannelError),
    /// `solo.rb` failed to upload.
    #[error("error uploading solo.rb: {0}")]
    UploadSoloRb(#[source] ChannelError),
    /// The install command failed.
    #[error("error installing Chef: {0}")]
    Install(#[source] RemoteError),
    /// The Chef-Solo run failed.
    #[error("error executing Chef: {0}")]
    Execute(#[source] RemoteError),
}
