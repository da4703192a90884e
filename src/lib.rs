//! Core library for the `solo-bootstrap` remote provisioning tool.
//!
//! The crate prepares a target machine for Chef-Solo: it resolves the guest
//! OS, fills OS-specific defaults, renders the install and run commands and
//! the `solo.rb`/`attributes.json` files, and drives the upload and execution
//! steps over a [`RemoteChannel`] such as [`SshChannel`].

pub mod bootstrap;
pub mod channel;
pub mod config;
pub mod os;
pub mod output;
pub mod test_support;

pub use bootstrap::{
    BootstrapError, BootstrapOrchestrator, BootstrapPlan, BootstrapSettings, RemoteError,
    ResolvedSettings, TemplateError,
};
pub use channel::{
    ChannelError, CommandOutput, CommandRunner, ProcessCommandRunner, RemoteChannel,
    RemoteCommandOutput, SshChannel, SshConfig, SshConfigLoadError,
};
pub use config::{BootstrapConfig, ConfigError};
pub use os::{OsDefaults, OsType, OsTypeError, TargetDescriptor, resolve_os_type};
pub use output::{OutputSink, RecordingSink, WriterSink};
