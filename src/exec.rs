//! Shell command execution for CLI-driven tests
//!
//! `openstack ...` commands run either on this machine with `OS_*` variables
//! exported from the run credentials ([`LocalExecutor`]) or on a remote host
//! over ssh after sourcing an openrc file ([`SshExecutor`]).

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::config::{Credentials, RemoteConfig};

/// Errors running a command
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {return_code}: {stderr}")]
    Failed {
        command: String,
        return_code: i32,
        stderr: String,
    },
}

/// Captured outcome of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit status; -1 when the process was killed by a signal
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn passed(&self) -> bool {
        self.return_code == 0
    }

    /// Turn a non-zero exit into [`ExecError::Failed`]
    pub fn check(self, command: &str) -> Result<Self, ExecError> {
        if self.passed() {
            Ok(self)
        } else {
            Err(ExecError::Failed {
                command: command.to_string(),
                return_code: self.return_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }

    /// Non-empty stdout lines, trimmed
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().map(str::trim).filter(|l| !l.is_empty())
    }
}

/// Run a program and capture its output
pub async fn run(program: &str, args: &[&str]) -> Result<CommandResult, ExecError> {
    run_with_env(program, args, &HashMap::new()).await
}

/// Run a program with extra environment variables
pub async fn run_with_env(
    program: &str,
    args: &[&str],
    env: &HashMap<String, String>,
) -> Result<CommandResult, ExecError> {
    debug!(program, ?args, "Running command");

    let output = Command::new(program)
        .args(args)
        .envs(env)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ExecError::CommandNotFound(program.to_string()),
            _ => ExecError::Spawn {
                command: program.to_string(),
                source,
            },
        })?;

    let result = CommandResult {
        return_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!(program, return_code = result.return_code, "Command finished");
    Ok(result)
}

/// Somewhere shell commands can run
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` through a shell and capture the result
    async fn execute(&self, command: &str) -> Result<CommandResult, ExecError>;
}

/// Runs commands here via `sh -c` with the credentials exported
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    env: HashMap<String, String>,
}

impl LocalExecutor {
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            env: credentials.to_env().into_iter().collect(),
        }
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    #[instrument(skip(self))]
    async fn execute(&self, command: &str) -> Result<CommandResult, ExecError> {
        run_with_env("sh", &["-c", command], &self.env).await
    }
}

/// Runs commands on a remote host after sourcing its openrc
#[derive(Debug, Clone)]
pub struct SshExecutor {
    remote: RemoteConfig,
}

impl SshExecutor {
    pub fn new(remote: RemoteConfig) -> Self {
        Self { remote }
    }

    fn remote_command(&self, command: &str) -> String {
        format!(". {} && {}", self.remote.openrc_path, command)
    }
}

#[async_trait]
impl CommandExecutor for SshExecutor {
    #[instrument(skip(self), fields(host = %self.remote.host))]
    async fn execute(&self, command: &str) -> Result<CommandResult, ExecError> {
        let target = format!("{}@{}", self.remote.user, self.remote.host);
        let remote = self.remote_command(command);
        run(
            "ssh",
            &[
                "-o",
                "BatchMode=yes",
                "-o",
                "StrictHostKeyChecking=no",
                &target,
                &remote,
            ],
        )
        .await
    }
}
