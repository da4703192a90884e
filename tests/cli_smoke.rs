//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

fn isolated_cmd(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("solo-bootstrap");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("SOLO_BOOTSTRAP_CONFIG_PATH")
        .env_remove("SOLO_SSH_HOST")
        .env_remove("SOLO_JSON")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("solo-bootstrap");
    cmd.assert().failure().stderr(contains("Usage"));
}

#[test]
fn cli_help_lists_run_subcommand() {
    let mut cmd = cargo_bin_cmd!("solo-bootstrap");
    cmd.arg("--help");
    cmd.assert().success().stdout(contains("run"));
}

#[test]
fn run_help_mentions_sudo_default() {
    let mut cmd = cargo_bin_cmd!("solo-bootstrap");
    cmd.args(["run", "--help"]);
    cmd.assert()
        .success()
        .stdout(contains("--prevent-sudo"))
        .stdout(contains("Unix targets use it by default"));
}

#[test]
fn cli_run_rejects_non_object_json() {
    let home = TempDir::new().expect("temp dir");
    let mut cmd = isolated_cmd(&home);
    cmd.args(["run", "--host", "203.0.113.10", "--json", "[1]"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("error parsing `json`"));
}

#[test]
fn cli_run_requires_host() {
    let home = TempDir::new().expect("temp dir");
    let mut cmd = isolated_cmd(&home);
    cmd.arg("run");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("missing host: set SOLO_SSH_HOST"));
}

#[test]
fn cli_run_rejects_unknown_guest_os() {
    let home = TempDir::new().expect("temp dir");
    let mut cmd = isolated_cmd(&home);
    cmd.args(["run", "--host", "203.0.113.10", "--guest-os-type", "plan9"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("SOLO_GUEST_OS_TYPE"));
}
