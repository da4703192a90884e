//! Chef-Solo bootstrap sequence.
//!
//! [`BootstrapOrchestrator`] resolves the guest OS, fills defaults, renders
//! every template, and only then touches the target: it creates the staging
//! directory, uploads cookbooks, `attributes.json` and `solo.rb`, installs
//! Chef unless told otherwise, and runs Chef-Solo. The first failing step
//! aborts the sequence.

mod error;
mod render;
mod settings;
mod template;

pub use error::{BootstrapError, RemoteError, TemplateError};
pub use render::{
    DEFAULT_SOLO_RB_TEMPLATE, RenderedCommands, attributes_json, quoted_path_list,
    render_command, render_solo_rb,
};
pub use settings::{BootstrapSettings, ResolvedSettings};
pub use template::{SyntaxError, translate};

use tracing::{debug, info};

use crate::channel::{RemoteChannel, RemoteCommandOutput};
use crate::config::ConfigError;
use crate::os::{TargetDescriptor, resolve_os_type};
use crate::output::OutputSink;

/// Remote file name of the node attributes.
pub const ATTRIBUTES_FILE_NAME: &str = "attributes.json";
/// Remote file name of the Chef-Solo configuration.
pub const SOLO_RB_FILE_NAME: &str = "solo.rb";

/// Everything the sequence sends to the target, prepared up front.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BootstrapPlan {
    /// Settings with OS defaults applied.
    pub settings: ResolvedSettings,
    /// Rendered install and run commands.
    pub commands: RenderedCommands,
    /// Body of `attributes.json`.
    pub attributes: String,
    /// Body of `solo.rb`.
    pub solo_rb: String,
}

impl BootstrapPlan {
    /// Resolves defaults for the target described by `target` and renders
    /// every template.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] when the OS cannot be resolved, settings
    /// are invalid, or a template fails to render.
    pub fn prepare(
        settings: BootstrapSettings,
        connection_type: &str,
    ) -> Result<Self, BootstrapError> {
        let target = TargetDescriptor::new(connection_type)
            .with_guest_os_type(settings.guest_os_type.clone());
        let os_type = resolve_os_type(&target).map_err(ConfigError::from)?;
        debug!(%os_type, connection_type, "resolved guest OS");

        let settings = settings.with_os_defaults(os_type)?;
        let commands = RenderedCommands::render(&settings)?;
        let attributes = attributes_json(&settings).map_err(BootstrapError::EncodeAttributes)?;
        let solo_rb = render_solo_rb(&settings)?;
        Ok(Self {
            settings,
            commands,
            attributes,
            solo_rb,
        })
    }
}

/// Drives the bootstrap sequence over a [`RemoteChannel`].
#[derive(Debug)]
pub struct BootstrapOrchestrator<C, S> {
    channel: C,
    sink: S,
}

impl<C, S> BootstrapOrchestrator<C, S>
where
    C: RemoteChannel,
    S: OutputSink,
{
    /// Creates an orchestrator that reports progress to `sink`.
    #[must_use]
    pub const fn new(channel: C, sink: S) -> Self {
        Self { channel, sink }
    }

    /// Returns the channel, mainly so tests can inspect recorded calls.
    #[must_use]
    pub const fn channel(&self) -> &C {
        &self.channel
    }

    /// Runs the full bootstrap sequence.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] naming the first step that failed. No
    /// remote call is made when settings or templates are invalid.
    pub async fn run(&self, settings: BootstrapSettings) -> Result<(), BootstrapError> {
        let plan = BootstrapPlan::prepare(settings, self.channel.connection_type())?;
        self.apply(&plan).await
    }

    /// Executes a prepared plan against the target.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] naming the first remote step that failed.
    pub async fn apply(&self, plan: &BootstrapPlan) -> Result<(), BootstrapError> {
        let settings = &plan.settings;

        self.sink.output("Creating configuration files...");
        self.create_staging_directory(settings).await?;
        self.upload_cookbooks(settings).await?;

        self.sink.output("Creating Chef JSON attributes file...");
        let attributes_path = settings.remote_path(ATTRIBUTES_FILE_NAME);
        self.channel
            .upload(&attributes_path, plan.attributes.as_bytes())
            .await
            .map_err(BootstrapError::UploadAttributes)?;

        self.sink.output("Creating solo.rb config file...");
        let solo_rb_path = settings.remote_path(SOLO_RB_FILE_NAME);
        self.channel
            .upload(&solo_rb_path, plan.solo_rb.as_bytes())
            .await
            .map_err(BootstrapError::UploadSoloRb)?;

        self.sink.output("Installing Chef-Solo...");
        if settings.skip_install {
            info!("skipping Chef install");
        } else {
            self.run_checked(&plan.commands.install)
                .await
                .map_err(BootstrapError::Install)?;
        }

        self.sink.output("Starting Chef-Solo...");
        self.run_checked(&plan.commands.execute)
            .await
            .map_err(BootstrapError::Execute)?;
        info!(staging = %settings.staging_directory, "Chef-Solo run completed");
        Ok(())
    }

    async fn create_staging_directory(
        &self,
        settings: &ResolvedSettings,
    ) -> Result<(), BootstrapError> {
        let command = settings.create_dir_command();
        self.run_checked(&command)
            .await
            .map_err(|source| BootstrapError::CreateDir {
                path: settings.staging_directory.clone(),
                source,
            })?;
        Ok(())
    }

    async fn upload_cookbooks(&self, settings: &ResolvedSettings) -> Result<(), BootstrapError> {
        let remote_paths = settings.remote_cookbook_paths();
        for (local, remote) in settings.cookbook_paths.iter().zip(&remote_paths) {
            debug!(%local, remote, "uploading cookbooks");
            self.channel
                .upload_dir(remote, local)
                .await
                .map_err(|source| BootstrapError::UploadCookbooks {
                    local_path: local.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    async fn run_checked(&self, command: &str) -> Result<RemoteCommandOutput, RemoteError> {
        debug!(command, "executing remote command");
        let output = self.channel.execute(command).await?;
        self.relay(&output);
        if output.is_success() {
            return Ok(output);
        }
        Err(RemoteError::NonZeroExit {
            command: command.to_owned(),
            status: output.exit_code,
            status_text: output.status_text(),
            stderr: output.stderr.trim().to_owned(),
        })
    }

    fn relay(&self, output: &RemoteCommandOutput) {
        output
            .stdout
            .lines()
            .chain(output.stderr.lines())
            .filter(|line| !line.trim().is_empty())
            .for_each(|line| self.sink.output(line));
    }
}
