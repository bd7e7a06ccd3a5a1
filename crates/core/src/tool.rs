//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! execute shell commands, read/write files, fetch web pages, etc.
//! Every tool declares a [`ToolKind`] (its mutation class) and a
//! [`ParameterSchema`]; the registry validates arguments against that
//! schema before a tool ever runs.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::schema::ParameterSchema;

/// The category of side effect a tool may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Read,
    Write,
    Shell,
    Network,
    Memory,
    Mcp,
}

impl ToolKind {
    /// Write, shell and memory tools change state; everything else is
    /// treated as read-only.
    pub fn is_mutating(&self) -> bool {
        matches!(self, ToolKind::Write | ToolKind::Shell | ToolKind::Memory)
    }
}

/// A single requested action, built by the registry after validation.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Arguments as a JSON object
    pub params: Value,

    /// Working directory the tool resolves relative paths against
    pub cwd: PathBuf,
}

impl ToolInvocation {
    pub fn new(params: Value, cwd: impl Into<PathBuf>) -> Self {
        Self {
            params,
            cwd: cwd.into(),
        }
    }

    /// String parameter by name.
    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Integer parameter by name, accepting integral floats.
    pub fn u64_param(&self, name: &str) -> Option<u64> {
        let value = self.params.get(name)?;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }

    pub fn bool_param(&self, name: &str) -> Option<bool> {
        self.params.get(name).and_then(Value::as_bool)
    }

    /// Resolve a possibly relative path against the invocation's cwd.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// Error description when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Structured data about the execution
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    /// Whether `output` was cut short
    #[serde(default)]
    pub truncated: bool,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attach partial output to a failure (e.g. a command's stdout).
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    /// The text fed back to the model as the tool message content.
    pub fn to_model_output(&self) -> String {
        if self.success {
            return self.output.clone();
        }
        let error = self.error.as_deref().unwrap_or("Tool execution failed");
        if self.output.is_empty() {
            format!("Error: {error}")
        } else {
            format!("Error: {error}\n{}", self.output)
        }
    }
}

/// A human-facing approval prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfirmation {
    pub tool_name: String,
    pub params: Value,
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_paths: Vec<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// The core Tool trait.
///
/// Each tool (shell, read_file, write_file, web_fetch, etc.) implements
/// this trait. Tools are registered in the [`ToolRegistry`] and made
/// available to the agent loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// Mutation class of this tool.
    fn kind(&self) -> ToolKind;

    /// The declared parameters.
    fn schema(&self) -> ParameterSchema;

    /// Violations of the declared schema; empty when `params` is valid.
    fn validate_params(&self, params: &Value) -> Vec<String> {
        self.schema().validate(params)
    }

    fn is_mutating(&self, _params: &Value) -> bool {
        self.kind().is_mutating()
    }

    /// Filesystem paths this invocation would modify.
    fn affected_paths(&self, _invocation: &ToolInvocation) -> Vec<PathBuf> {
        Vec::new()
    }

    /// The shell command this invocation would run, if any.
    fn shell_command(&self, _params: &Value) -> Option<String> {
        None
    }

    /// A tool-declared hazard not expressible as a command pattern.
    fn is_dangerous(&self, _params: &Value) -> bool {
        false
    }

    /// Build the prompt shown to the operator when approval is required.
    fn confirmation(&self, invocation: &ToolInvocation) -> ToolConfirmation {
        ToolConfirmation {
            tool_name: self.name().to_string(),
            params: invocation.params.clone(),
            description: format!("Execute {}", self.name()),
            affected_paths: self.affected_paths(invocation),
            command: self.shell_command(&invocation.params),
        }
    }

    /// Execute the tool.
    ///
    /// Expected failures (missing file, non-zero exit, HTTP error) are
    /// returned as `Ok(ToolResult::failure(..))`. An `Err` is contained by
    /// the registry and reported as an internal error.
    async fn execute(
        &self,
        invocation: ToolInvocation,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema().to_json_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Validate and execute tools when the LLM requests them
///
/// Register everything before the registry is shared with an agent; it is
/// not meant to be mutated while a dispatch is in flight.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Overwriting existing tool registration");
        } else {
            debug!(tool = %name, "Registered tool");
        }
    }

    /// Remove a tool. Returns whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        let removed = self.tools.remove(name).is_some();
        if !removed {
            warn!(tool = %name, "Attempted to unregister unknown tool");
        }
        removed
    }

    /// Keep only the named tools.
    pub fn retain(&mut self, allowed: &[String]) {
        self.tools.retain(|name, _| allowed.iter().any(|a| a == name));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the LLM), ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and execute a tool call.
    ///
    /// Never fails: unknown tools, invalid parameters, tool errors and
    /// panics all come back as a failed [`ToolResult`].
    pub async fn invoke(&self, name: &str, params: Value, cwd: Option<&Path>) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::failure(format!("Unknown tool: {name}"))
                .with_metadata("tool_name", json!(name));
        };

        let violations = tool.validate_params(&params);
        if !violations.is_empty() {
            debug!(tool = %name, errors = ?violations, "Rejected invalid tool parameters");
            return ToolResult::failure(format!("Invalid parameters: {}", violations.join("; ")))
                .with_metadata("tool_name", json!(name))
                .with_metadata("validation_errors", json!(violations));
        }

        let cwd = match cwd {
            Some(cwd) => cwd.to_path_buf(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        let invocation = ToolInvocation::new(params, cwd);

        match AssertUnwindSafe(tool.execute(invocation)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(tool = %name, error = %e, "Tool execution failed");
                ToolResult::failure(format!("Internal error: {e}"))
                    .with_metadata("tool_name", json!(name))
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(tool = %name, reason = %reason, "Tool panicked during execution");
                ToolResult::failure(format!("Internal error: {reason}"))
                    .with_metadata("tool_name", json!(name))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}
