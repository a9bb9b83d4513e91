// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shell command executor.
//!
//! Spawns a child process with the chosen interpreter in its own process
//! group, captures stdout and stderr, and kills the group leader when the
//! timeout expires. The child never inherits the parent's interactive
//! session: stdin is null.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use steward_core::StewardError;
use tokio::process::Command;
use tracing::info;

use crate::catalog;
use crate::registry::{ToolHandler, ToolRegistry};

/// Hard ceiling for process-spawning tools.
const MAX_TIMEOUT_SECS: u64 = 120;

/// Host-level options for the shell executor.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    /// Whether `execute_shell_command` is registered at all.
    pub enabled: bool,
    /// Interpreter used when a call omits one.
    pub default_interpreter: String,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            default_interpreter: "sh".to_string(),
        }
    }
}

/// Registers the shell executor when enabled.
pub fn register(registry: &mut ToolRegistry, options: ShellOptions) {
    if !options.enabled {
        return;
    }
    registry.register(
        catalog::execute_shell_command(),
        Arc::new(ExecuteShellCommand { options }),
    );
}

#[derive(Debug, Deserialize)]
struct ShellParams {
    command: String,
    shell: Option<String>,
    timeout_sec: Option<u64>,
}

struct ExecuteShellCommand {
    options: ShellOptions,
}

#[async_trait]
impl ToolHandler for ExecuteShellCommand {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: ShellParams =
            serde_json::from_value(params).map_err(|e| StewardError::BadParams {
                detail: e.to_string(),
            })?;

        let interpreter = params
            .shell
            .unwrap_or_else(|| self.options.default_interpreter.clone());
        let timeout_secs = params
            .timeout_sec
            .unwrap_or(MAX_TIMEOUT_SECS)
            .min(MAX_TIMEOUT_SECS);

        let mut command = build_command(&interpreter, &params.command)?;
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        info!(interpreter = %interpreter, timeout_secs, "spawning shell command");

        let child = command.spawn().map_err(|e| StewardError::Internal(
            format!("failed to spawn {interpreter}: {e}"),
        ))?;

        let duration = Duration::from_secs(timeout_secs);
        let output = match tokio::time::timeout(duration, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(StewardError::Internal(format!(
                    "failed to collect command output: {e}"
                )))
            }
            // The dropped future kills the group leader.
            Err(_) => return Err(StewardError::Timeout { duration }),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        Ok(json!({
            "exit_code": exit_code,
            "success": output.status.success(),
            "stdout": stdout,
            "stderr": stderr,
            "shell": interpreter,
        }))
    }
}

fn build_command(interpreter: &str, command_line: &str) -> Result<Command, StewardError> {
    let mut command = match interpreter {
        "sh" => {
            let mut c = Command::new("sh");
            c.arg("-c");
            c
        }
        "cmd" => {
            let mut c = Command::new("cmd");
            c.arg("/C");
            c
        }
        "powershell" => {
            let mut c = Command::new("powershell");
            c.args(["-NoProfile", "-Command"]);
            c
        }
        other => {
            return Err(StewardError::BadParams {
                detail: format!("unsupported shell interpreter: {other}"),
            })
        }
    };
    command.arg(command_line);
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> ExecuteShellCommand {
        ExecuteShellCommand {
            options: ShellOptions::default(),
        }
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn captures_stdout_and_exit_code() {
        let out = handler()
            .invoke(json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert_eq!(out["exit_code"], 0);
        assert_eq!(out["success"], true);
        assert_eq!(out["stdout"].as_str().unwrap().trim(), "hello");
        assert_eq!(out["shell"], "sh");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn nonzero_exit_is_reported_not_an_error() {
        let out = handler()
            .invoke(json!({"command": "echo oops >&2; exit 3"}))
            .await
            .unwrap();
        assert_eq!(out["exit_code"], 3);
        assert_eq!(out["success"], false);
        assert!(out["stderr"].as_str().unwrap().contains("oops"));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn timeout_kills_the_command() {
        let result = handler()
            .invoke(json!({"command": "sleep 30", "timeout_sec": 1}))
            .await;
        match result {
            Err(StewardError::Timeout { duration }) => {
                assert_eq!(duration, Duration::from_secs(1));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsupported_interpreter_is_bad_params() {
        let result = handler()
            .invoke(json!({"command": "echo hi", "shell": "fish"}))
            .await;
        match result {
            Err(StewardError::BadParams { detail }) => assert!(detail.contains("fish")),
            other => panic!("expected BadParams, got {other:?}"),
        }
    }

    #[test]
    fn disabled_options_skip_registration() {
        let mut registry = ToolRegistry::new();
        register(
            &mut registry,
            ShellOptions {
                enabled: false,
                default_interpreter: "sh".into(),
            },
        );
        assert!(registry.get("execute_shell_command").is_none());
    }

    #[test]
    fn timeout_is_clamped_to_ceiling() {
        // The clamp lives in invoke(); verify the constant contract here.
        assert_eq!(MAX_TIMEOUT_SECS, 120);
        assert_eq!(catalog::execute_shell_command().timeout_secs, 120);
    }
}
