//! Shell tool — execute system commands.
//!
//! Commands run under `sh -c` in the invocation's working directory with a
//! filtered environment. A small list of catastrophic commands is refused
//! outright, independent of the approval policy.

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use steward_config::ShellEnvironmentPolicy;
use steward_core::error::ToolError;
use steward_core::schema::{ParamType, Parameter, ParameterSchema};
use steward_core::tool::{Tool, ToolConfirmation, ToolInvocation, ToolKind, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::truncate_bytes;

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 600;
const MAX_OUTPUT_BYTES: usize = 100 * 1024;

const BLOCKED_COMMANDS: &[&str] = &[
    "rm -rf /",
    "rm -rf ~",
    "rm -rf /*",
    "dd if=/dev/zero",
    "dd if=/dev/random",
    "mkfs",
    "fdisk",
    "parted",
    ":(){ :|:& };:",
    "chmod 777 /",
    "chmod -R 777",
    "shutdown",
    "reboot",
    "halt",
    "poweroff",
    "init 0",
    "init 6",
];

fn blocked_entry(command: &str) -> Option<&'static str> {
    let lowered = command.to_lowercase();
    BLOCKED_COMMANDS
        .iter()
        .copied()
        .find(|blocked| lowered.contains(&blocked.to_lowercase()))
}

/// Execute shell commands with a filtered environment and a timeout.
pub struct ShellTool {
    environment: ShellEnvironmentPolicy,
}

impl ShellTool {
    pub fn new(environment: ShellEnvironmentPolicy) -> Self {
        Self { environment }
    }

    /// Environment for a child process: the given variables minus the
    /// excluded names, plus the policy's `set_vars`.
    fn build_env(&self, vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        let excludes: Vec<Pattern> = self
            .environment
            .effective_excludes()
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "Ignoring invalid environment exclude pattern");
                    None
                }
            })
            .collect();

        let mut env: HashMap<String, String> = vars
            .filter(|(name, _)| !excludes.iter().any(|p| p.matches_with(name, options)))
            .collect();
        env.extend(
            self.environment
                .set_vars
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        env
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Use this for running programs, \
         checking files, git operations, etc."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Shell
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .param(
                Parameter::new("command", ParamType::String)
                    .required()
                    .describe("The shell command to execute"),
            )
            .param(
                Parameter::new("timeout", ParamType::Integer)
                    .describe("Timeout in seconds")
                    .default_value(json!(DEFAULT_TIMEOUT_SECS))
                    .range(MIN_TIMEOUT_SECS as f64, MAX_TIMEOUT_SECS as f64),
            )
            .param(
                Parameter::new("cwd", ParamType::String)
                    .describe("Working directory for the command"),
            )
    }

    fn shell_command(&self, params: &Value) -> Option<String> {
        params
            .get("command")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn confirmation(&self, invocation: &ToolInvocation) -> ToolConfirmation {
        let command = self.shell_command(&invocation.params);
        ToolConfirmation {
            tool_name: self.name().to_string(),
            params: invocation.params.clone(),
            description: format!("Run shell command: {}", command.as_deref().unwrap_or("")),
            affected_paths: Vec::new(),
            command,
        }
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let command = invocation
            .str_param("command")
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        if let Some(blocked) = blocked_entry(command) {
            warn!(command = %command, blocked = %blocked, "Refusing blocked command");
            return Ok(ToolResult::failure(format!(
                "Command blocked for safety: {command}"
            )));
        }

        let timeout_secs = invocation
            .u64_param("timeout")
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
        let cwd = match invocation.str_param("cwd") {
            Some(dir) => invocation.resolve_path(dir),
            None => invocation.cwd.clone(),
        };
        if !cwd.is_dir() {
            return Ok(ToolResult::failure(format!(
                "Working directory does not exist: {}",
                cwd.display()
            )));
        }

        debug!(command = %command, cwd = %cwd.display(), timeout_secs, "Executing shell command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .env_clear()
            .envs(self.build_env(std::env::vars()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(c) => c,
            Err(e) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "shell".into(),
                    reason: e.to_string(),
                });
            }
        };

        // Dropping the wait future on timeout kills the child.
        let output = match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "shell".into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(command = %command, timeout_secs, "Command timed out");
                return Ok(ToolResult::failure(format!(
                    "Command timed out after {timeout_secs} seconds"
                ))
                .with_metadata("timed_out", json!(true)));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut combined = stdout.trim_end().to_string();
        if !stderr.trim().is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str("[stderr]: ");
            combined.push_str(stderr.trim_end());
        }

        let (kept, truncated) = truncate_bytes(&combined, MAX_OUTPUT_BYTES);
        let mut text = kept.to_string();
        if truncated {
            text.push_str("\n... [output truncated]");
        }

        let exit_code = output.status.code().unwrap_or(-1);
        let result = if output.status.success() {
            ToolResult::success(text)
        } else {
            warn!(command = %command, exit_code, "Command failed");
            ToolResult::failure(format!("Command exited with code {exit_code}")).with_output(text)
        };
        Ok(result
            .with_truncated(truncated)
            .with_metadata("exit_code", json!(exit_code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> ShellTool {
        ShellTool::new(ShellEnvironmentPolicy::default())
    }

    fn run(dir: &std::path::Path, params: Value) -> ToolInvocation {
        ToolInvocation::new(params, dir)
    }

    #[test]
    fn shell_definition() {
        let def = tool().to_definition();
        assert_eq!(def.name, "shell");
        assert_eq!(def.parameters["properties"]["timeout"]["maximum"], json!(600));
        assert_eq!(def.parameters["required"], json!(["command"]));
    }

    #[test]
    fn timeout_out_of_range_fails_validation() {
        let errors = tool().validate_params(&json!({"command": "ls", "timeout": 0}));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("timeout"));
    }

    #[test]
    fn exposes_command_for_approval() {
        let params = json!({"command": "git status"});
        assert_eq!(tool().shell_command(&params).as_deref(), Some("git status"));
        let confirmation = tool().confirmation(&ToolInvocation::new(params, "/tmp"));
        assert_eq!(confirmation.command.as_deref(), Some("git status"));
        assert_eq!(confirmation.description, "Run shell command: git status");
    }

    #[tokio::test]
    async fn shell_echo() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool()
            .execute(run(dir.path(), json!({"command": "echo hello"})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello");
        assert_eq!(result.metadata["exit_code"], json!(0));
    }

    #[tokio::test]
    async fn runs_in_invocation_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let result = tool()
            .execute(run(dir.path(), json!({"command": "ls"})))
            .await
            .unwrap();
        assert!(result.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure_with_output() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool()
            .execute(run(dir.path(), json!({"command": "echo oops >&2; exit 3"})))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Command exited with code 3"));
        assert!(result.output.contains("[stderr]: oops"));
        assert_eq!(result.metadata["exit_code"], json!(3));
    }

    #[tokio::test]
    async fn blocked_command_refused() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool()
            .execute(run(dir.path(), json!({"command": "sudo SHUTDOWN -h now"})))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Command blocked for safety"));
    }

    #[tokio::test]
    async fn timeout_kills_command() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool()
            .execute(run(dir.path(), json!({"command": "sleep 5", "timeout": 1})))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Command timed out after 1 seconds")
        );
    }

    #[tokio::test]
    async fn missing_cwd_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool()
            .execute(run(dir.path(), json!({"command": "ls", "cwd": "nope"})))
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[test]
    fn env_filtering_is_case_insensitive() {
        let mut policy = ShellEnvironmentPolicy::default();
        policy.set_vars.insert("STEWARD".into(), "1".into());
        let env = ShellTool::new(policy).build_env(
            vec![
                ("PATH".to_string(), "/bin".to_string()),
                ("openai_api_key".to_string(), "sk-x".to_string()),
                ("GITHUB_TOKEN".to_string(), "t".to_string()),
            ]
            .into_iter(),
        );
        assert_eq!(env.get("PATH").map(String::as_str), Some("/bin"));
        assert_eq!(env.get("STEWARD").map(String::as_str), Some("1"));
        assert!(!env.contains_key("openai_api_key"));
        assert!(!env.contains_key("GITHUB_TOKEN"));
    }

    #[test]
    fn ignoring_default_excludes_passes_secrets() {
        let policy = ShellEnvironmentPolicy {
            ignore_default_excludes: true,
            ..ShellEnvironmentPolicy::default()
        };
        let env = ShellTool::new(policy)
            .build_env(vec![("API_KEY".to_string(), "k".to_string())].into_iter());
        assert!(env.contains_key("API_KEY"));
    }
}
