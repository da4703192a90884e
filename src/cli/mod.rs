//! Command-line interface definitions for the `solo-bootstrap` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `solo-bootstrap` binary.
#[derive(Debug, Parser)]
#[command(
    name = "solo-bootstrap",
    about = "Bootstrap a remote machine with Chef-Solo over SSH",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Upload cookbooks and configuration, install Chef, and run Chef-Solo.
    #[command(
        name = "run",
        about = "Upload cookbooks and configuration, install Chef, and run Chef-Solo"
    )]
    Run(RunCommand),
}

/// Arguments for the `solo-bootstrap run` subcommand.
///
/// Every flag overrides the value loaded from `solo-bootstrap.toml` and the
/// `SOLO_*` environment variables.
#[derive(Debug, Default, Parser)]
pub(crate) struct RunCommand {
    /// Hostname or IP address of the target.
    #[arg(long, value_name = "HOST")]
    pub(crate) host: Option<String>,
    /// Remote user to connect as.
    #[arg(long, value_name = "USER")]
    pub(crate) user: Option<String>,
    /// SSH port of the target.
    #[arg(long, value_name = "PORT")]
    pub(crate) port: Option<u16>,
    /// SSH private key used to authenticate.
    #[arg(long, value_name = "PATH")]
    pub(crate) identity_file: Option<String>,
    /// Local cookbook directory; repeat to upload several in order.
    #[arg(long = "cookbook-path", value_name = "PATH")]
    pub(crate) cookbook_paths: Vec<String>,
    /// Recipe or role to apply; repeat to build the run list in order.
    #[arg(long = "run-list", value_name = "ITEM")]
    pub(crate) run_list: Vec<String>,
    /// Node attributes as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub(crate) json: Option<String>,
    /// Chef version to install.
    #[arg(long, value_name = "VERSION")]
    pub(crate) version: Option<String>,
    /// Skip installing Chef on the target.
    #[arg(long)]
    pub(crate) skip_install: bool,
    /// Run install and Chef-Solo without `sudo` (Unix targets use it by default).
    #[arg(long)]
    pub(crate) prevent_sudo: bool,
    /// Remote directory receiving cookbooks and configuration.
    #[arg(long, value_name = "DIR")]
    pub(crate) staging_directory: Option<String>,
    /// Guest OS of the target (`unix` or `windows`).
    #[arg(long, value_name = "OS")]
    pub(crate) guest_os_type: Option<String>,
    /// Remote roles directory written to `solo.rb`.
    #[arg(long, value_name = "PATH")]
    pub(crate) roles_path: Option<String>,
    /// Remote environments directory written to `solo.rb`.
    #[arg(long, value_name = "PATH")]
    pub(crate) environments_path: Option<String>,
    /// Chef environment the node joins.
    #[arg(long, value_name = "NAME")]
    pub(crate) chef_environment: Option<String>,
    /// Local `solo.rb` template replacing the built-in one.
    #[arg(long, value_name = "PATH")]
    pub(crate) config_template: Option<String>,
}
