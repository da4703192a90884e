//! Tests for remote command execution over SSH.

use rstest::rstest;

use super::fixtures::{args_of, base_config, channel_with};
use crate::channel::{ChannelError, RemoteChannel, SshConfig};

#[tokio::test]
async fn execute_passes_options_login_and_command() {
    let base_config = base_config();
    let (channel, runner) = channel_with(base_config);
    runner.push_output(Some(0), "hello\n", "");

    let output = channel.execute("echo hello").await.expect("command runs");
    assert_eq!(output.exit_code, Some(0));
    assert_eq!(output.stdout, "hello\n");

    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].program, "ssh");
    assert_eq!(
        args_of(&runner, 0),
        vec![
            "-p",
            "2222",
            "-o",
            "BatchMode=yes",
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
            "-o",
            "ConnectTimeout=30",
            "ubuntu@203.0.113.10",
            "echo hello",
        ]
    );
}

#[tokio::test]
async fn identity_file_is_forwarded() {
    let base_config = base_config();
    let cfg = SshConfig {
        identity_file: Some(String::from("/keys/id_ed25519")),
        ..base_config
    };
    let (channel, runner) = channel_with(cfg);
    runner.push_success();
    channel.execute("true").await.expect("command runs");

    let args = args_of(&runner, 0);
    let position = args
        .iter()
        .position(|arg| arg == "-i")
        .expect("identity flag present");
    assert_eq!(args.get(position + 1).map(String::as_str), Some("/keys/id_ed25519"));
}

#[tokio::test]
async fn hardened_config_drops_relaxed_options() {
    let base_config = base_config();
    let cfg = SshConfig {
        batch_mode: false,
        strict_host_key_checking: true,
        known_hosts_file: String::new(),
        connect_timeout_secs: 0,
        ..base_config
    };
    let (channel, runner) = channel_with(cfg);
    runner.push_success();
    channel.execute("true").await.expect("command runs");

    assert_eq!(
        args_of(&runner, 0),
        vec!["-p", "2222", "ubuntu@203.0.113.10", "true"]
    );
}

#[tokio::test]
async fn non_zero_exit_is_returned_not_raised() {
    let base_config = base_config();
    let (channel, runner) = channel_with(base_config);
    runner.push_output(Some(2), "", "boom");

    let output = channel.execute("false").await.expect("command runs");
    assert!(!output.is_success());
    assert_eq!(output.status_text(), "2");
    assert_eq!(output.stderr, "boom");
}

#[tokio::test]
async fn ssh_status_255_is_a_connection_error() {
    let base_config = base_config();
    let (channel, runner) = channel_with(base_config);
    runner.push_output(Some(255), "", "Connection refused");

    let err = channel.execute("true").await.expect_err("transport fails");
    assert_eq!(
        err,
        ChannelError::Connection {
            login: String::from("ubuntu@203.0.113.10"),
            stderr: String::from("Connection refused"),
        }
    );
}

#[tokio::test]
async fn spawn_failure_propagates() {
    let base_config = base_config();
    let (channel, _runner) = channel_with(base_config);
    let err = channel.execute("true").await.expect_err("no response queued");
    assert!(matches!(err, ChannelError::Spawn { .. }));
}

#[rstest]
fn reports_ssh_connection_type(base_config: SshConfig) {
    let (channel, _runner) = channel_with(base_config);
    assert_eq!(channel.connection_type(), "ssh");
}
