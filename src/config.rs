//! Configuration loading via `ortho-config`.
//!
//! [`BootstrapConfig`] is the raw, layered input: defaults, then
//! `solo-bootstrap.toml`, then `SOLO_*` environment variables, with CLI flags
//! applied on top by the binary. [`BootstrapConfig::decode`] turns it into the
//! immutable [`BootstrapSettings`] consumed by the orchestrator, parsing the
//! JSON attributes and reading any custom `solo.rb` template from disk.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use ortho_config::OrthoConfig;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::bootstrap::BootstrapSettings;
use crate::channel::expand_tilde;
use crate::os::{OsType, OsTypeError};

/// Bootstrap settings derived from configuration files, environment
/// variables, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SOLO",
    discovery(
        app_name = "solo-bootstrap",
        env_var = "SOLO_BOOTSTRAP_CONFIG_PATH",
        config_file_name = "solo-bootstrap.toml",
        dotfile_name = ".solo-bootstrap.toml",
        project_file_name = "solo-bootstrap.toml"
    )
)]
pub struct BootstrapConfig {
    /// Chef environment the node joins (`environment` in `solo.rb`).
    pub chef_environment: Option<String>,
    /// Local path of a custom `solo.rb` template.
    pub config_template: Option<String>,
    /// Local cookbook directories; order decides the remote
    /// `cookbooks-<index>` name.
    #[serde(default)]
    pub cookbook_paths: Vec<String>,
    /// Remote path of the Chef environments directory.
    pub environments_path: Option<String>,
    /// Template overriding the OS default Chef-Solo run command.
    pub execute_command: Option<String>,
    /// Explicit guest OS (`unix` or `windows`); inferred from the connection
    /// when unset.
    pub guest_os_type: Option<String>,
    /// Template overriding the OS default Chef install command.
    pub install_command: Option<String>,
    /// Node attributes as a JSON object.
    pub json: Option<String>,
    /// Whether to run commands without `sudo`; OS default when unset.
    pub prevent_sudo: Option<bool>,
    /// Recipes to apply, in order.
    #[serde(default)]
    pub run_list: Vec<String>,
    /// Remote path of the Chef roles directory.
    pub roles_path: Option<String>,
    /// Remote directory receiving uploads; OS default when unset.
    pub staging_directory: Option<String>,
    /// Skip the Chef install step.
    #[ortho_config(default = false)]
    #[serde(default)]
    pub skip_install: bool,
    /// Chef version passed to the installer.
    #[ortho_config(cli_long = "chef-version")]
    pub version: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn message(&self, problem: &str) -> String {
        format!(
            "{} {problem}: set {} or {} in solo-bootstrap.toml",
            self.description, self.env_var, self.toml_key
        )
    }
}

const STAGING_DIRECTORY: FieldMetadata = FieldMetadata::new(
    "staging directory",
    "SOLO_STAGING_DIRECTORY",
    "staging_directory",
);
const GUEST_OS_TYPE: FieldMetadata =
    FieldMetadata::new("guest OS type", "SOLO_GUEST_OS_TYPE", "guest_os_type");
const COOKBOOK_PATHS: FieldMetadata =
    FieldMetadata::new("cookbook path", "SOLO_COOKBOOK_PATHS", "cookbook_paths");

impl BootstrapConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("solo-bootstrap")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and TOML key that supply the offending value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the staging directory is
    /// explicitly blank, a cookbook path is blank, or the guest OS type is
    /// unknown.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .staging_directory
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            return Err(ConfigError::InvalidField(
                STAGING_DIRECTORY.message("must not be empty"),
            ));
        }

        if self.cookbook_paths.iter().any(|path| path.trim().is_empty()) {
            return Err(ConfigError::InvalidField(
                COOKBOOK_PATHS.message("must not be empty"),
            ));
        }

        if let Some(os) = self
            .guest_os_type
            .as_deref()
            .filter(|value| !value.trim().is_empty())
        {
            os.parse::<OsType>().map_err(|err| {
                ConfigError::InvalidField(GUEST_OS_TYPE.message(&format!("is invalid ({err})")))
            })?;
        }

        Ok(())
    }

    /// Validates the configuration and decodes it into [`BootstrapSettings`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails, `json` is not a JSON
    /// object, or the custom config template cannot be read.
    pub fn decode(&self) -> Result<BootstrapSettings, ConfigError> {
        self.validate()?;

        let json = parse_json_attributes(self.json.as_deref())?;
        let config_template = self
            .config_template
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .map(read_template)
            .transpose()?;

        Ok(BootstrapSettings {
            chef_environment: non_blank(self.chef_environment.as_deref()),
            config_template,
            cookbook_paths: self
                .cookbook_paths
                .iter()
                .map(|path| Utf8PathBuf::from(expand_tilde(path)))
                .collect(),
            environments_path: non_blank(self.environments_path.as_deref()),
            execute_command: self.execute_command.clone(),
            guest_os_type: non_blank(self.guest_os_type.as_deref()),
            install_command: self.install_command.clone(),
            json,
            prevent_sudo: self.prevent_sudo,
            run_list: self.run_list.clone(),
            roles_path: non_blank(self.roles_path.as_deref()),
            staging_directory: self.staging_directory.clone(),
            skip_install: self.skip_install,
            version: non_blank(self.version.as_deref()),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|inner| !inner.trim().is_empty())
        .map(str::to_owned)
}

/// Parses the `json` setting into an attribute map.
///
/// A missing or blank value yields an empty map.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidJson`] when the text is not valid JSON or is
/// valid JSON but not an object.
pub fn parse_json_attributes(raw: Option<&str>) -> Result<Map<String, Value>, ConfigError> {
    let Some(text) = raw.filter(|value| !value.trim().is_empty()) else {
        return Ok(Map::new());
    };

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ConfigError::InvalidJson(String::from(
            "expected a JSON object",
        ))),
        Err(err) => Err(ConfigError::InvalidJson(err.to_string())),
    }
}

fn read_template(path: &str) -> Result<String, ConfigError> {
    let expanded = expand_tilde(path);
    read_to_string_ambient(Utf8Path::new(&expanded)).map_err(|message| {
        ConfigError::TemplateRead {
            path: expanded.clone(),
            message,
        }
    })
}

fn read_to_string_ambient(path: &Utf8Path) -> Result<String, String> {
    let (dir_path, file_path) = if path.is_absolute() {
        let parent = path
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path}"))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}

/// Errors raised during configuration loading, validation, and decoding.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Indicates a configuration field holds an unusable value.
    #[error("invalid configuration: {0}")]
    InvalidField(String),
    /// Raised when `json` is not a JSON object.
    #[error("error parsing `json`: {0}")]
    InvalidJson(String),
    /// Raised when the custom `solo.rb` template cannot be read.
    #[error("failed to read config template `{path}`: {message}")]
    TemplateRead {
        /// Expanded path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the guest OS cannot be determined.
    #[error("cannot determine guest OS: {0}")]
    OsType(#[from] OsTypeError),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::EnvGuard;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use tempfile::TempDir;

    #[fixture]
    fn base_config() -> BootstrapConfig {
        BootstrapConfig {
            chef_environment: None,
            config_template: None,
            cookbook_paths: vec![String::from("cookbooks")],
            environments_path: None,
            execute_command: None,
            guest_os_type: None,
            install_command: None,
            json: None,
            prevent_sudo: None,
            run_list: vec![String::from("base::default")],
            roles_path: None,
            staging_directory: None,
            skip_install: false,
            version: None,
        }
    }

    #[rstest]
    fn decode_preserves_explicit_values(base_config: BootstrapConfig) {
        let cfg = BootstrapConfig {
            prevent_sudo: Some(false),
            staging_directory: Some(String::from("/opt/stage")),
            version: Some(String::from("14.2")),
            ..base_config
        };
        let settings = cfg.decode().expect("config should decode");
        assert_eq!(settings.prevent_sudo, Some(false));
        assert_eq!(settings.staging_directory.as_deref(), Some("/opt/stage"));
        assert_eq!(settings.version.as_deref(), Some("14.2"));
        assert_eq!(settings.cookbook_paths, vec![Utf8PathBuf::from("cookbooks")]);
        assert_eq!(settings.run_list, vec![String::from("base::default")]);
    }

    #[rstest]
    fn decode_leaves_unset_fields_unset(base_config: BootstrapConfig) {
        let settings = base_config.decode().expect("config should decode");
        assert_eq!(settings.prevent_sudo, None);
        assert_eq!(settings.staging_directory, None);
        assert_eq!(settings.install_command, None);
        assert_eq!(settings.execute_command, None);
        assert!(settings.json.is_empty());
    }

    #[tokio::test]
    async fn load_without_cli_args_reads_solo_environment() {
        let _guard = EnvGuard::set_vars(&[
            ("SOLO_VERSION", "17.10.3"),
            ("SOLO_STAGING_DIRECTORY", "/srv/stage"),
            ("SOLO_SKIP_INSTALL", "true"),
            ("SOLO_PREVENT_SUDO", "true"),
            ("SOLO_CHEF_ENVIRONMENT", "staging"),
        ])
        .await;

        let cfg = BootstrapConfig::load_without_cli_args().expect("config should load");

        assert_eq!(cfg.version.as_deref(), Some("17.10.3"));
        assert_eq!(cfg.staging_directory.as_deref(), Some("/srv/stage"));
        assert!(cfg.skip_install);
        assert_eq!(cfg.prevent_sudo, Some(true));
        let settings = cfg.decode().expect("config should decode");
        assert_eq!(settings.version.as_deref(), Some("17.10.3"));
        assert_eq!(settings.chef_environment.as_deref(), Some("staging"));
    }

    #[rstest]
    fn decode_treats_blank_version_as_unset(base_config: BootstrapConfig) {
        let cfg = BootstrapConfig {
            version: Some(String::from("  ")),
            ..base_config
        };
        let settings = cfg.decode().expect("config should decode");
        assert_eq!(settings.version, None);
    }

    #[test]
    fn json_object_is_parsed() {
        let map = parse_json_attributes(Some(r#"{"a":1,"nested":{"b":true}}"#))
            .expect("object should parse");
        assert_eq!(Value::Object(map), json!({"a": 1, "nested": {"b": true}}));
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("   "))]
    fn missing_json_yields_empty_map(#[case] raw: Option<&str>) {
        let map = parse_json_attributes(raw).expect("blank json is allowed");
        assert!(map.is_empty());
    }

    #[rstest]
    #[case("[1,2]")]
    #[case("\"text\"")]
    #[case("not json")]
    #[case("{\"a\":")]
    fn non_object_json_is_rejected(#[case] raw: &str) {
        let err = parse_json_attributes(Some(raw)).expect_err("should be rejected");
        assert!(
            matches!(err, ConfigError::InvalidJson(_)),
            "unexpected error: {err:?}"
        );
        assert!(err.to_string().contains("`json`"), "unexpected message: {err}");
    }

    #[rstest]
    fn decode_rejects_malformed_json(base_config: BootstrapConfig) {
        let cfg = BootstrapConfig {
            json: Some(String::from("[1]")),
            ..base_config
        };
        assert!(matches!(cfg.decode(), Err(ConfigError::InvalidJson(_))));
    }

    #[rstest]
    fn validation_rejects_blank_staging_directory(base_config: BootstrapConfig) {
        let cfg = BootstrapConfig {
            staging_directory: Some(String::from(" ")),
            ..base_config
        };
        let err = cfg.validate().expect_err("blank staging directory");
        let message = err.to_string();
        assert!(message.contains("SOLO_STAGING_DIRECTORY"), "{message}");
        assert!(message.contains("staging_directory"), "{message}");
    }

    #[rstest]
    fn validation_rejects_blank_cookbook_path(base_config: BootstrapConfig) {
        let cfg = BootstrapConfig {
            cookbook_paths: vec![String::from("a"), String::new()],
            ..base_config
        };
        let err = cfg.validate().expect_err("blank cookbook path");
        assert!(err.to_string().contains("SOLO_COOKBOOK_PATHS"), "{err}");
    }

    #[rstest]
    fn validation_rejects_unknown_guest_os(base_config: BootstrapConfig) {
        let cfg = BootstrapConfig {
            guest_os_type: Some(String::from("beos")),
            ..base_config
        };
        let err = cfg.validate().expect_err("unknown os");
        assert!(err.to_string().contains("beos"), "{err}");
        assert!(err.to_string().contains("SOLO_GUEST_OS_TYPE"), "{err}");
    }

    #[rstest]
    fn decode_reads_config_template(base_config: BootstrapConfig) {
        let tmp = TempDir::new().expect("temp dir");
        let path = tmp.path().join("solo.rb.j2");
        std::fs::write(&path, "cookbook_path [{{.CookbookPaths}}]\n").expect("write template");
        let cfg = BootstrapConfig {
            config_template: Some(path.to_string_lossy().into_owned()),
            ..base_config
        };
        let settings = cfg.decode().expect("config should decode");
        assert_eq!(
            settings.config_template.as_deref(),
            Some("cookbook_path [{{.CookbookPaths}}]\n")
        );
    }

    #[rstest]
    fn decode_reports_missing_config_template(base_config: BootstrapConfig) {
        let cfg = BootstrapConfig {
            config_template: Some(String::from("/nonexistent/solo.rb.j2")),
            ..base_config
        };
        let err = cfg.decode().expect_err("missing template");
        assert!(
            matches!(err, ConfigError::TemplateRead { ref path, .. } if path == "/nonexistent/solo.rb.j2"),
            "unexpected error: {err:?}"
        );
    }
}
