//! Running forge commands

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::options::OptionsError;

/// A shell command to run for its output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    /// Script passed to `sh -c`
    pub script: String,
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
}

/// Runs a shell command and returns its stdout
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &ShellCommand) -> Result<String, OptionsError>;
}

/// Runs commands with `sh -c` as child processes
///
/// The child is killed when it outlives its timeout or when the returned
/// future is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &ShellCommand) -> Result<String, OptionsError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command.script)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| OptionsError::Spawn {
            command: command.script.clone(),
            message: e.to_string(),
        })?;

        debug!(command = %command.script, "running forge command");
        let output = match timeout(command.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| OptionsError::Spawn {
                command: command.script.clone(),
                message: e.to_string(),
            })?,
            Err(_) => {
                return Err(OptionsError::Timeout {
                    command: command.script.clone(),
                    after: command.timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(OptionsError::ExitStatus {
                command: command.script.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
