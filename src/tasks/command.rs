// ABOUTME: Command task implementation for running external programs and shell scripts
// ABOUTME: Captures stdout/stderr and maps unexpected exit codes to task failures

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::error::{Result, TaskError};
use super::schema::Parameters;
use super::AsyncTask;

/// Configuration for a command task
///
/// Either `command` (with optional `args`) or `script` must be set:
///
/// ```yaml
/// kind: command
/// config:
///   command: echo
///   args: ["hello"]
/// ```
///
/// ```yaml
/// kind: command
/// config:
///   script: |
///     set -e
///     ls -1 | wc -l
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub script: Option<String>,

    #[serde(default = "default_shell")]
    pub shell: String,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub working_dir: Option<String>,

    /// Exit codes treated as success. Defaults to `[0]`.
    #[serde(default = "default_exit_codes")]
    pub expected_exit_codes: Vec<i32>,
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_exit_codes() -> Vec<i32> {
    vec![0]
}

impl CommandConfig {
    pub fn validate(&self) -> Result<()> {
        match (&self.command, &self.script) {
            (None, None) => Err(TaskError::Config(
                "either 'command' or 'script' must be provided".to_string(),
            )),
            (Some(_), Some(_)) => Err(TaskError::Config(
                "cannot specify both 'command' and 'script'".to_string(),
            )),
            (Some(command), None) if command.trim().is_empty() => {
                Err(TaskError::Config("command cannot be empty".to_string()))
            }
            (None, Some(script)) if script.trim().is_empty() => {
                Err(TaskError::Config("script cannot be empty".to_string()))
            }
            (None, Some(_)) if self.shell.is_empty() => Err(TaskError::Config(
                "shell cannot be empty in script mode".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

pub struct CommandTask {
    config: CommandConfig,
}

impl CommandTask {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, extra_args: Vec<String>) -> Command {
        let mut cmd = match (&self.config.command, &self.config.script) {
            (Some(command), _) => {
                let mut cmd = Command::new(command);
                cmd.args(&self.config.args);
                cmd
            }
            (None, script) => {
                let mut cmd = Command::new(&self.config.shell);
                cmd.arg("-c").arg(script.as_deref().unwrap_or_default());
                // positional parameters for the script start at $1
                cmd.arg(&self.config.shell);
                cmd
            }
        };

        cmd.args(extra_args);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }
        if let Some(ref working_dir) = self.config.working_dir {
            cmd.current_dir(working_dir);
        }
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Input `args` entries are passed as extra arguments; scalars are stringified
fn extra_args(params: &Parameters) -> Result<Vec<String>> {
    match params.get("args") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()),
        Some(_) => Err(TaskError::invalid_input("args", "should be an array")),
    }
}

#[async_trait]
impl AsyncTask for CommandTask {
    async fn execute(&self, params: Parameters) -> Result<Value> {
        let args = extra_args(&params)?;
        let mut cmd = self.build_command(args);

        match &self.config.command {
            Some(command) => info!("Executing command: {}", command),
            None => info!("Executing script with {}", self.config.shell),
        }

        let output = cmd.output().await?;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!("Command completed with exit code: {}", exit_code);

        if !self.config.expected_exit_codes.contains(&exit_code) {
            let message = format!(
                "command exited with unexpected code {} (expected one of {:?}): {}",
                exit_code,
                self.config.expected_exit_codes,
                stderr.trim()
            );
            error!("{}", message);
            return Err(TaskError::Failed(message));
        }

        Ok(json!({
            "stdout": stdout,
            "stderr": stderr,
            "exit_code": exit_code,
        }))
    }
}
