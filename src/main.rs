//! Binary entry point for the `solo-bootstrap` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use solo_bootstrap::{
    BootstrapConfig, BootstrapError, BootstrapOrchestrator, ChannelError, ConfigError, SshChannel,
    SshConfig, WriterSink,
};

mod cli;

use cli::{Cli, RunCommand};

const DEFAULT_LOG_FILTER: &str = "solo_bootstrap=info";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Settings(#[from] ConfigError),
    #[error("ssh error: {0}")]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Run(command) => run_command(command).await,
    }
}

async fn run_command(args: RunCommand) -> Result<(), CliError> {
    let mut ssh_config =
        SshConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let mut bootstrap_config =
        BootstrapConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    apply_overrides(args, &mut ssh_config, &mut bootstrap_config);

    let settings = bootstrap_config.decode()?;
    let channel = SshChannel::with_process_runner(ssh_config)?;
    tracing::info!(login = %channel.config().login(), "bootstrapping target");

    let orchestrator = BootstrapOrchestrator::new(channel, WriterSink::new(io::stderr()));
    orchestrator.run(settings).await?;
    Ok(())
}

fn apply_overrides(args: RunCommand, ssh: &mut SshConfig, config: &mut BootstrapConfig) {
    if args.host.is_some() {
        ssh.host = args.host;
    }
    if let Some(user) = args.user {
        ssh.user = user;
    }
    if let Some(port) = args.port {
        ssh.port = port;
    }
    if args.identity_file.is_some() {
        ssh.identity_file = args.identity_file;
    }

    if !args.cookbook_paths.is_empty() {
        config.cookbook_paths = args.cookbook_paths;
    }
    if !args.run_list.is_empty() {
        config.run_list = args.run_list;
    }
    if args.skip_install {
        config.skip_install = true;
    }
    if args.prevent_sudo {
        config.prevent_sudo = Some(true);
    }
    override_option(&mut config.json, args.json);
    override_option(&mut config.version, args.version);
    override_option(&mut config.staging_directory, args.staging_directory);
    override_option(&mut config.guest_os_type, args.guest_os_type);
    override_option(&mut config.roles_path, args.roles_path);
    override_option(&mut config.environments_path, args.environments_path);
    override_option(&mut config.chef_environment, args.chef_environment);
    override_option(&mut config.config_template, args.config_template);
}

fn override_option(target: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *target = value;
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
