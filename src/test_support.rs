//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::channel::{
    ChannelError, ChannelFuture, CommandOutput, CommandRunner, RemoteChannel,
    RemoteCommandOutput,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Serialises tests that mutate `SOLO_*` environment variables.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Sets environment variables for the lifetime of the guard and restores the
/// previous values on drop.
#[derive(Debug)]
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Acquires [`ENV_LOCK`] and applies `pairs`.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }
        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in self.previous.iter().rev() {
            // SAFETY: `_guard` still holds `ENV_LOCK` here.
            unsafe {
                match old {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations).clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        lock(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ChannelError> {
        lock(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| ChannelError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// A single operation observed by [`ScriptedChannel`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChannelCall {
    /// A command executed on the target.
    Execute(String),
    /// A generated file written to the target.
    Upload {
        /// Destination path on the target.
        remote_path: String,
        /// Uploaded bytes decoded as UTF-8 (lossy).
        contents: String,
    },
    /// A local directory uploaded to the target.
    UploadDir {
        /// Destination path on the target.
        remote_path: String,
        /// Local directory that was uploaded.
        local_dir: Utf8PathBuf,
    },
}

#[derive(Debug, Default)]
struct ChannelState {
    calls: Vec<ChannelCall>,
    exit_codes: VecDeque<Option<i32>>,
    failing_paths: BTreeSet<String>,
    failing_commands: BTreeSet<String>,
}

/// In-memory [`RemoteChannel`] that records every call.
///
/// Commands succeed with exit code zero unless an exit code was queued with
/// [`ScriptedChannel::push_exit_code`]. Uploads succeed unless their remote
/// path was registered with [`ScriptedChannel::fail_upload_to`].
#[derive(Clone, Debug)]
pub struct ScriptedChannel {
    connection_type: String,
    state: Arc<Mutex<ChannelState>>,
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new("ssh")
    }
}

impl ScriptedChannel {
    /// Creates a channel reporting `connection_type`.
    #[must_use]
    pub fn new(connection_type: impl Into<String>) -> Self {
        Self {
            connection_type: connection_type.into(),
            state: Arc::new(Mutex::new(ChannelState::default())),
        }
    }

    /// Returns a snapshot of the recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<ChannelCall> {
        lock(&self.state).calls.clone()
    }

    /// Returns the commands executed so far, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChannelCall::Execute(command) => Some(command),
                ChannelCall::Upload { .. } | ChannelCall::UploadDir { .. } => None,
            })
            .collect()
    }

    /// Returns the contents uploaded to `remote_path`, if any.
    #[must_use]
    pub fn uploaded(&self, remote_path: &str) -> Option<String> {
        self.calls().into_iter().find_map(|call| match call {
            ChannelCall::Upload {
                remote_path: path,
                contents,
            } if path == remote_path => Some(contents),
            _ => None,
        })
    }

    /// Queues the exit code reported by the next executed command.
    pub fn push_exit_code(&self, code: Option<i32>) {
        lock(&self.state).exit_codes.push_back(code);
    }

    /// Makes any upload (file or directory) to `remote_path` fail.
    pub fn fail_upload_to(&self, remote_path: &str) {
        lock(&self.state)
            .failing_paths
            .insert(remote_path.to_owned());
    }

    /// Makes the transport fail when `command` is executed.
    pub fn fail_command(&self, command: &str) {
        lock(&self.state)
            .failing_commands
            .insert(command.to_owned());
    }

    fn record_upload(&self, call: ChannelCall, remote_path: &str) -> Result<(), ChannelError> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        if state.failing_paths.contains(remote_path) {
            return Err(ChannelError::CommandFailure {
                program: String::from("rsync"),
                status: Some(23),
                status_text: String::from("23"),
                stderr: format!("scripted upload failure for {remote_path}"),
            });
        }
        Ok(())
    }
}

impl RemoteChannel for ScriptedChannel {
    fn connection_type(&self) -> &str {
        &self.connection_type
    }

    fn execute<'a>(&'a self, command: &'a str) -> ChannelFuture<'a, RemoteCommandOutput> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            state.calls.push(ChannelCall::Execute(command.to_owned()));
            if state.failing_commands.contains(command) {
                return Err(ChannelError::Connection {
                    login: String::from("scripted@target"),
                    stderr: String::from("scripted transport failure"),
                });
            }
            let exit_code = state.exit_codes.pop_front().unwrap_or(Some(0));
            Ok(RemoteCommandOutput {
                exit_code,
                stdout: format!("ran {command}"),
                stderr: String::new(),
            })
        })
    }

    fn upload<'a>(&'a self, remote_path: &'a str, contents: &'a [u8]) -> ChannelFuture<'a, ()> {
        Box::pin(async move {
            let call = ChannelCall::Upload {
                remote_path: remote_path.to_owned(),
                contents: String::from_utf8_lossy(contents).into_owned(),
            };
            self.record_upload(call, remote_path)
        })
    }

    fn upload_dir<'a>(
        &'a self,
        remote_path: &'a str,
        local_dir: &'a Utf8Path,
    ) -> ChannelFuture<'a, ()> {
        Box::pin(async move {
            let call = ChannelCall::UploadDir {
                remote_path: remote_path.to_owned(),
                local_dir: local_dir.to_path_buf(),
            };
            self.record_upload(call, remote_path)
        })
    }
}
