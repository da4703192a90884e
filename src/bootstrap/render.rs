//! Rendering of command templates and generated Chef configuration files.
//!
//! Templates use Go template syntax and are rendered through minijinja after
//! translation. Command templates see `.Version`, `.StagingDirectory` and
//! `.Sudo`; the `solo.rb` template sees `.CookbookPaths`, `.RolesPath`,
//! `.EnvironmentsPath`, `.ChefEnvironment` and `.StagingDirectory`. Unset
//! optional values are empty strings so `{{if .Version}}` guards drop the
//! segment entirely. Unknown fields are rejected.

use minijinja::{Environment, UndefinedBehavior, Value as TemplateContext, context};
use serde_json::Value;

use super::error::TemplateError;
use super::settings::ResolvedSettings;
use super::template::translate;

/// Built-in `solo.rb` template.
pub const DEFAULT_SOLO_RB_TEMPLATE: &str = r#"cookbook_path     [{{.CookbookPaths}}]
{{- if .RolesPath}}
role_path         "{{.RolesPath}}"
{{- end}}
{{- if .EnvironmentsPath}}
environment_path  "{{.EnvironmentsPath}}"
{{- end}}
{{- if .ChefEnvironment}}
environment       "{{.ChefEnvironment}}"
{{- end}}
"#;

/// Install and run commands ready to send to the target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RenderedCommands {
    /// Command installing Chef.
    pub install: String,
    /// Command running Chef-Solo.
    pub execute: String,
}

impl RenderedCommands {
    /// Renders both command templates of `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] naming the failing template.
    pub fn render(settings: &ResolvedSettings) -> Result<Self, TemplateError> {
        Ok(Self {
            install: render_command("install_command", &settings.install_command, settings)?,
            execute: render_command("execute_command", &settings.execute_command, settings)?,
        })
    }
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env
}

fn render(name: &str, template: &str, ctx: TemplateContext) -> Result<String, TemplateError> {
    let source = translate(template).map_err(|err| TemplateError::new(name, &err))?;
    environment()
        .render_str(&source, ctx)
        .map_err(|err| TemplateError::new(name, &err))
}

/// Renders a single command template against the resolved settings.
///
/// # Errors
///
/// Returns [`TemplateError`] when the template is malformed or references an
/// unknown variable.
pub fn render_command(
    name: &str,
    template: &str,
    settings: &ResolvedSettings,
) -> Result<String, TemplateError> {
    render(
        name,
        template,
        context! {
            Version => settings.version.as_str(),
            StagingDirectory => settings.staging_directory.as_str(),
            Sudo => !settings.prevent_sudo,
        },
    )
}

/// Formats remote cookbook paths as a comma-joined, double-quoted list.
#[must_use]
pub fn quoted_path_list(paths: &[String]) -> String {
    paths
        .iter()
        .map(|path| format!("\"{path}\""))
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders `solo.rb` from the custom template when one is configured, or
/// from [`DEFAULT_SOLO_RB_TEMPLATE`] otherwise.
///
/// # Errors
///
/// Returns [`TemplateError`] when the template is malformed.
pub fn render_solo_rb(settings: &ResolvedSettings) -> Result<String, TemplateError> {
    let template = settings
        .config_template
        .as_deref()
        .unwrap_or(DEFAULT_SOLO_RB_TEMPLATE);
    render(
        "solo.rb",
        template,
        context! {
            CookbookPaths => quoted_path_list(&settings.remote_cookbook_paths()),
            RolesPath => settings.roles_path.as_str(),
            EnvironmentsPath => settings.environments_path.as_str(),
            ChefEnvironment => settings.chef_environment.as_str(),
            StagingDirectory => settings.staging_directory.as_str(),
        },
    )
}

/// Builds the `attributes.json` body.
///
/// `run_list` is added only when non-empty and replaces any `run_list` key
/// already present in the attributes. Output is indented by two spaces.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if serialisation fails.
pub fn attributes_json(settings: &ResolvedSettings) -> Result<String, serde_json::Error> {
    let mut attributes = settings.json.clone();
    if !settings.run_list.is_empty() {
        attributes.insert(
            String::from("run_list"),
            Value::from(settings.run_list.clone()),
        );
    }
    serde_json::to_string_pretty(&Value::Object(attributes))
}
