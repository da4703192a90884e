//! Bootstrap settings before and after OS defaults are applied.

use camino::Utf8PathBuf;
use serde_json::{Map, Value};

use crate::config::ConfigError;
use crate::os::OsType;

/// Decoded bootstrap settings.
///
/// Fields that fall back to an OS default are `Option`s: `None` means the
/// caller left them unset, while `Some(false)` or `Some(String::new())` are
/// explicit choices that defaults never overwrite.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BootstrapSettings {
    /// Chef environment written to `solo.rb` when set.
    pub chef_environment: Option<String>,
    /// Custom `solo.rb` template body replacing the built-in one.
    pub config_template: Option<String>,
    /// Local cookbook directories, in upload order.
    pub cookbook_paths: Vec<Utf8PathBuf>,
    /// Remote environments directory written to `solo.rb` when set.
    pub environments_path: Option<String>,
    /// Run command template; OS default when unset.
    pub execute_command: Option<String>,
    /// Explicit guest OS tag; inferred from the channel when unset.
    pub guest_os_type: Option<String>,
    /// Install command template; OS default when unset.
    pub install_command: Option<String>,
    /// Node attributes uploaded as `attributes.json`.
    pub json: Map<String, Value>,
    /// Run without `sudo`; OS default when unset.
    pub prevent_sudo: Option<bool>,
    /// Recipes to apply, in order.
    pub run_list: Vec<String>,
    /// Remote roles directory written to `solo.rb` when set.
    pub roles_path: Option<String>,
    /// Remote staging directory; OS default when unset.
    pub staging_directory: Option<String>,
    /// Skip the install step entirely.
    pub skip_install: bool,
    /// Chef version handed to the installer.
    pub version: Option<String>,
}

impl BootstrapSettings {
    /// Fills every unset field from the defaults for `os_type`.
    ///
    /// The staging directory is normalised to forward slashes without a
    /// trailing separator so every derived remote path has one shape.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the staging directory was
    /// explicitly set to a blank value.
    pub fn with_os_defaults(self, os_type: OsType) -> Result<ResolvedSettings, ConfigError> {
        let defaults = os_type.defaults();
        let staging = self
            .staging_directory
            .unwrap_or_else(|| defaults.staging_directory.to_owned());
        if staging.trim().is_empty() {
            return Err(ConfigError::InvalidField(String::from(
                "staging directory must not be empty",
            )));
        }

        Ok(ResolvedSettings {
            os_type,
            prevent_sudo: self.prevent_sudo.unwrap_or(defaults.prevent_sudo),
            staging_directory: normalise_remote_dir(&staging),
            install_command: self
                .install_command
                .unwrap_or_else(|| defaults.install_command.to_owned()),
            execute_command: self
                .execute_command
                .unwrap_or_else(|| defaults.execute_command.to_owned()),
            chef_environment: self.chef_environment.unwrap_or_default(),
            config_template: self.config_template,
            cookbook_paths: self.cookbook_paths,
            environments_path: self.environments_path.unwrap_or_default(),
            json: self.json,
            run_list: self.run_list,
            roles_path: self.roles_path.unwrap_or_default(),
            skip_install: self.skip_install,
            version: self.version.unwrap_or_default(),
        })
    }
}

/// Settings with every OS-dependent field filled in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedSettings {
    /// Guest OS the defaults were taken from.
    pub os_type: OsType,
    /// Whether commands run without `sudo`.
    pub prevent_sudo: bool,
    /// Remote staging directory, forward slashes, no trailing separator.
    pub staging_directory: String,
    /// Install command template.
    pub install_command: String,
    /// Run command template.
    pub execute_command: String,
    /// Chef environment, empty when unset.
    pub chef_environment: String,
    /// Custom `solo.rb` template body.
    pub config_template: Option<String>,
    /// Local cookbook directories, in upload order.
    pub cookbook_paths: Vec<Utf8PathBuf>,
    /// Remote environments directory, empty when unset.
    pub environments_path: String,
    /// Node attributes.
    pub json: Map<String, Value>,
    /// Recipes to apply, in order.
    pub run_list: Vec<String>,
    /// Remote roles directory, empty when unset.
    pub roles_path: String,
    /// Skip the install step entirely.
    pub skip_install: bool,
    /// Chef version, empty when unset.
    pub version: String,
}

impl ResolvedSettings {
    /// Path of `name` inside the staging directory.
    #[must_use]
    pub fn remote_path(&self, name: &str) -> String {
        format!("{}/{name}", self.staging_directory.trim_end_matches('/'))
    }

    /// Remote destinations of the cookbook directories, index-aligned with
    /// [`ResolvedSettings::cookbook_paths`].
    #[must_use]
    pub fn remote_cookbook_paths(&self) -> Vec<String> {
        (0..self.cookbook_paths.len())
            .map(|index| self.remote_path(&format!("cookbooks-{index}")))
            .collect()
    }

    /// Command that creates the staging directory on the target.
    #[must_use]
    pub fn create_dir_command(&self) -> String {
        self.os_type
            .defaults()
            .create_dir_command(&self.staging_directory)
    }
}

fn normalise_remote_dir(path: &str) -> String {
    let slashed = path.trim().replace('\\', "/");
    let trimmed = slashed.trim_end_matches('/');
    if trimmed.is_empty() {
        String::from("/")
    } else {
        trimmed.to_owned()
    }
}
