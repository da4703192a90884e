//! Guest operating system detection and the per-OS defaults table.
//!
//! The bootstrap sequence needs a handful of values that differ between Unix
//! and Windows targets: where to stage files, how to install and run
//! Chef-Solo, and how to create the staging directory. They live in a constant
//! table keyed by [`OsType`] so adding another OS is a matter of adding a
//! variant and a table entry.

use std::fmt;
use std::str::FromStr;

use shell_escape::unix::escape;
use thiserror::Error;

/// Guest operating system family of the bootstrap target.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OsType {
    /// Linux, BSD, macOS and anything else reached over a POSIX shell.
    Unix,
    /// Windows targets, typically reached over `WinRM`.
    Windows,
}

impl OsType {
    /// Returns the configuration tag for this OS (`unix` or `windows`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unix => "unix",
            Self::Windows => "windows",
        }
    }

    /// Returns the defaults applied to unset settings for this OS.
    #[must_use]
    pub const fn defaults(self) -> &'static OsDefaults {
        match self {
            Self::Unix => &UNIX_DEFAULTS,
            Self::Windows => &WINDOWS_DEFAULTS,
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsType {
    type Err = OsTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "unix" => Ok(Self::Unix),
            "windows" => Ok(Self::Windows),
            other => Err(OsTypeError::UnsupportedOsType(other.to_owned())),
        }
    }
}

/// Errors raised while working out which OS the target runs.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OsTypeError {
    /// Raised when `guest_os_type` names an OS without a defaults entry.
    #[error("unsupported guest OS type `{0}`: expected `unix` or `windows`")]
    UnsupportedOsType(String),
    /// Raised when the connection type does not imply an OS.
    #[error("unsupported connection type `{0}`: expected `ssh` or `winrm`")]
    UnsupportedConnectionType(String),
}

/// Defaults for a single OS family.
#[derive(Debug, Eq, PartialEq)]
pub struct OsDefaults {
    /// Whether commands run without a `sudo` prefix.
    pub prevent_sudo: bool,
    /// Remote directory receiving every uploaded artefact.
    pub staging_directory: &'static str,
    /// Template for the Chef-Solo install command.
    pub install_command: &'static str,
    /// Template for the Chef-Solo run command.
    pub execute_command: &'static str,
    create_dir: CreateDirStyle,
}

#[derive(Debug, Eq, PartialEq)]
enum CreateDirStyle {
    Posix,
    Cmd,
}

impl OsDefaults {
    /// Builds the command that creates `path` on the target.
    ///
    /// On Unix the directory is made world-writable.
    #[must_use]
    pub fn create_dir_command(&self, path: &str) -> String {
        match self.create_dir {
            CreateDirStyle::Posix => {
                let escaped = escape(path.into());
                let script = format!("mkdir -p {escaped}; chmod 777 {escaped}");
                format!("sh -c {}", escape(script.into()))
            }
            CreateDirStyle::Cmd => {
                format!("cmd /c if not exist \"{path}\" mkdir \"{path}\"")
            }
        }
    }
}

const UNIX_DEFAULTS: OsDefaults = OsDefaults {
    prevent_sudo: false,
    staging_directory: "/tmp/terraform-chef-solo",
    install_command: concat!(
        "sh -c 'command -v chef-solo || (curl -LO https://omnitruck.chef.io/install.sh && ",
        "{{if .Sudo}}sudo {{end}}sh install.sh{{if .Version}} -v {{.Version}}{{end}})'"
    ),
    execute_command: concat!(
        "{{if .Sudo}}sudo {{end}}chef-solo --no-color ",
        "-c {{.StagingDirectory}}/solo.rb -j {{.StagingDirectory}}/attributes.json"
    ),
    create_dir: CreateDirStyle::Posix,
};

const WINDOWS_DEFAULTS: OsDefaults = OsDefaults {
    prevent_sudo: true,
    staging_directory: "C:/Windows/Temp/packer-chef-solo",
    install_command: concat!(
        "powershell.exe -Command \". { iwr -useb https://omnitruck.chef.io/install.ps1 } | iex; ",
        "Install-Project{{if .Version}} -version {{.Version}}{{end}}\""
    ),
    execute_command: concat!(
        "C:/opscode/chef/bin/chef-solo.bat --no-color ",
        "-c {{.StagingDirectory}}/solo.rb -j {{.StagingDirectory}}/attributes.json"
    ),
    create_dir: CreateDirStyle::Cmd,
};

/// What is known about the target before anything runs on it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TargetDescriptor {
    /// Transport used to reach the target (`ssh`, `winrm`, or empty).
    pub connection_type: String,
    /// Explicit OS override supplied by the caller.
    pub guest_os_type: Option<String>,
}

impl TargetDescriptor {
    /// Creates a descriptor for the given connection type.
    #[must_use]
    pub fn new(connection_type: impl Into<String>) -> Self {
        Self {
            connection_type: connection_type.into(),
            guest_os_type: None,
        }
    }

    /// Sets an explicit guest OS override.
    #[must_use]
    pub fn with_guest_os_type(mut self, value: Option<String>) -> Self {
        self.guest_os_type = value;
        self
    }
}

/// Determines the OS family of the target.
///
/// An explicit, non-blank `guest_os_type` wins. Otherwise the connection type
/// decides: `ssh` (or no type at all) means Unix and `winrm` means Windows.
///
/// # Errors
///
/// Returns [`OsTypeError`] when the override names an unknown OS or the
/// connection type does not map to one.
pub fn resolve_os_type(target: &TargetDescriptor) -> Result<OsType, OsTypeError> {
    if let Some(explicit) = target
        .guest_os_type
        .as_deref()
        .filter(|value| !value.trim().is_empty())
    {
        return explicit.parse();
    }

    match target.connection_type.trim() {
        "" | "ssh" => Ok(OsType::Unix),
        "winrm" => Ok(OsType::Windows),
        other => Err(OsTypeError::UnsupportedConnectionType(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ssh", OsType::Unix)]
    #[case("", OsType::Unix)]
    #[case("winrm", OsType::Windows)]
    fn connection_type_selects_os(#[case] connection: &str, #[case] expected: OsType) {
        let target = TargetDescriptor::new(connection);
        assert_eq!(resolve_os_type(&target), Ok(expected));
    }

    #[test]
    fn explicit_guest_os_type_overrides_connection() {
        let target =
            TargetDescriptor::new("ssh").with_guest_os_type(Some(String::from("windows")));
        assert_eq!(resolve_os_type(&target), Ok(OsType::Windows));
    }

    #[test]
    fn blank_guest_os_type_falls_back_to_connection() {
        let target = TargetDescriptor::new("winrm").with_guest_os_type(Some(String::from("  ")));
        assert_eq!(resolve_os_type(&target), Ok(OsType::Windows));
    }

    #[test]
    fn unknown_guest_os_type_is_rejected() {
        let target = TargetDescriptor::new("ssh").with_guest_os_type(Some(String::from("plan9")));
        assert_eq!(
            resolve_os_type(&target),
            Err(OsTypeError::UnsupportedOsType(String::from("plan9")))
        );
    }

    #[test]
    fn unknown_connection_type_is_rejected() {
        let err = resolve_os_type(&TargetDescriptor::new("telnet"))
            .expect_err("telnet should not map to an OS");
        assert!(err.to_string().contains("telnet"), "unexpected error: {err}");
    }

    #[test]
    fn unix_create_dir_relaxes_permissions() {
        let command = OsType::Unix.defaults().create_dir_command("/tmp/chef");
        assert_eq!(command, "sh -c 'mkdir -p /tmp/chef; chmod 777 /tmp/chef'");
    }

    #[test]
    fn unix_create_dir_escapes_spaces() {
        let command = OsType::Unix.defaults().create_dir_command("/tmp/my chef");
        assert!(command.starts_with("sh -c "), "unexpected command: {command}");
        assert!(command.contains("my chef"), "unexpected command: {command}");
    }

    #[test]
    fn windows_create_dir_uses_cmd() {
        let command = OsType::Windows.defaults().create_dir_command("C:/stage");
        assert_eq!(command, "cmd /c if not exist \"C:/stage\" mkdir \"C:/stage\"");
    }

    #[test]
    fn defaults_differ_by_os() {
        assert!(!OsType::Unix.defaults().prevent_sudo);
        assert!(OsType::Windows.defaults().prevent_sudo);
        assert_eq!(
            OsType::Unix.defaults().staging_directory,
            "/tmp/terraform-chef-solo"
        );
        assert_eq!(
            OsType::Windows.defaults().staging_directory,
            "C:/Windows/Temp/packer-chef-solo"
        );
    }
}
