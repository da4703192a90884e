//! Shared fixtures for channel tests.

use rstest::fixture;

use crate::channel::{SshChannel, SshConfig};
use crate::test_support::ScriptedRunner;

#[fixture]
pub fn base_config() -> SshConfig {
    SshConfig {
        host: Some(String::from("203.0.113.10")),
        user: String::from("ubuntu"),
        port: 2222,
        ssh_bin: String::from("ssh"),
        rsync_bin: String::from("rsync"),
        batch_mode: true,
        strict_host_key_checking: false,
        known_hosts_file: String::from("/dev/null"),
        identity_file: None,
        connect_timeout_secs: 30,
    }
}

pub fn channel_with(config: SshConfig) -> (SshChannel<ScriptedRunner>, ScriptedRunner) {
    let runner = ScriptedRunner::new();
    let channel = SshChannel::new(config, runner.clone()).expect("config should validate");
    (channel, runner)
}

pub fn args_of(runner: &ScriptedRunner, index: usize) -> Vec<String> {
    runner
        .invocations()
        .get(index)
        .map(|invocation| {
            invocation
                .args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}
