//! Configuration loading, validation, and management for Steward.
//!
//! Loads configuration from `~/.steward/config.toml` with environment
//! variable overrides. Validates all settings before any agent run starts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_MODEL_NAME: &str = "arcee-ai/trinity-large-preview:free";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_CONTEXT_WINDOW: u32 = 256_000;
pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;

/// The root configuration structure.
///
/// Maps directly to `~/.steward/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model selection and sampling
    #[serde(default)]
    pub model: ModelConfig,

    /// Where to reach the model and how to authenticate
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Working-directory root; the process cwd when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// How eagerly mutating actions are approved
    #[serde(default)]
    pub approval: ApprovalPolicy,

    /// Upper bound on model turns per run
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Environment handed to shell commands
    #[serde(default)]
    pub shell_environment: ShellEnvironmentPolicy,

    #[serde(default)]
    pub hooks_enabled: bool,

    #[serde(default)]
    pub hooks: Vec<HookConfig>,

    /// Remote tool server definitions, keyed by server name
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,

    /// If set, only these tools are available to the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_instructions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_instructions: Option<String>,

    #[serde(default)]
    pub debug: bool,
}

fn default_max_turns() -> usize {
    100
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("cwd", &self.cwd)
            .field("approval", &self.approval)
            .field("max_turns", &self.max_turns)
            .field("shell_environment", &self.shell_environment)
            .field("hooks_enabled", &self.hooks_enabled)
            .field("hooks", &self.hooks)
            .field("mcp_servers", &self.mcp_servers)
            .field("allowed_tools", &self.allowed_tools)
            .field("developer_instructions", &self.developer_instructions)
            .field("user_instructions", &self.user_instructions)
            .field("debug", &self.debug)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Token budget of one model request
    #[serde(default = "default_context_window")]
    pub context_window: u32,
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.into()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_context_window() -> u32 {
    DEFAULT_CONTEXT_WINDOW
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            temperature: default_temperature(),
            context_window: default_context_window(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

/// Approval policy for mutating actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalPolicy {
    /// Ask for anything not on the safe list
    #[default]
    OnRequest,
    /// Run everything that passes the dangerous-command filter
    OnFailure,
    Auto,
    /// Like `OnRequest` for commands; file edits inside the root pass
    AutoEdit,
    /// Never ask: safe-listed commands run, everything else is rejected
    Never,
    /// No guardrails at all
    Yolo,
}

impl ApprovalPolicy {
    pub const ALL: [ApprovalPolicy; 6] = [
        ApprovalPolicy::OnRequest,
        ApprovalPolicy::OnFailure,
        ApprovalPolicy::Auto,
        ApprovalPolicy::AutoEdit,
        ApprovalPolicy::Never,
        ApprovalPolicy::Yolo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalPolicy::OnRequest => "on-request",
            ApprovalPolicy::OnFailure => "on-failure",
            ApprovalPolicy::Auto => "auto",
            ApprovalPolicy::AutoEdit => "auto-edit",
            ApprovalPolicy::Never => "never",
            ApprovalPolicy::Yolo => "yolo",
        }
    }
}

impl fmt::Display for ApprovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "Unknown approval policy '{s}' (expected one of: {})",
                    Self::ALL.map(|p| p.as_str()).join(", ")
                ))
            })
    }
}

/// Which variables of the parent environment reach shell commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellEnvironmentPolicy {
    /// Drop the built-in secret patterns from `exclude_patterns`' defaults
    #[serde(default)]
    pub ignore_default_excludes: bool,

    /// Glob patterns matched case-insensitively against variable names
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Variables always set for shell commands
    #[serde(default)]
    pub set_vars: HashMap<String, String>,
}

pub fn default_exclude_patterns() -> Vec<String> {
    vec!["*KEY*".into(), "*TOKEN*".into(), "*SECRET*".into()]
}

impl Default for ShellEnvironmentPolicy {
    fn default() -> Self {
        Self {
            ignore_default_excludes: false,
            exclude_patterns: default_exclude_patterns(),
            set_vars: HashMap::new(),
        }
    }
}

impl ShellEnvironmentPolicy {
    /// Patterns in effect: configured ones, minus the defaults when
    /// `ignore_default_excludes` is set.
    pub fn effective_excludes(&self) -> Vec<String> {
        if !self.ignore_default_excludes {
            return self.exclude_patterns.clone();
        }
        let defaults = default_exclude_patterns();
        self.exclude_patterns
            .iter()
            .filter(|p| !defaults.contains(p))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookTrigger {
    BeforeAgent,
    AfterAgent,
    BeforeTool,
    AfterTool,
    OnError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConfig {
    pub name: String,
    pub trigger: HookTrigger,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    #[serde(default = "default_hook_timeout")]
    pub timeout_sec: f64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_hook_timeout() -> f64 {
    30.0
}

/// A remote tool server. Exactly one transport must be configured:
/// `command` (stdio) or `url` (http/sse).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_mcp_startup_timeout")]
    pub startup_timeout_sec: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_mcp_startup_timeout() -> f64 {
    10.0
}

impl McpServerConfig {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let has_command = self.command.is_some();
        let has_url = self.url.as_deref().is_some_and(|u| !u.is_empty());
        match (has_command, has_url) {
            (false, false) => Err(ConfigError::ValidationError(format!(
                "MCP server '{name}' must have either 'command' (stdio) or 'url' (http/sse)"
            ))),
            (true, true) => Err(ConfigError::ValidationError(format!(
                "MCP server '{name}' cannot have both 'command' (stdio) and 'url' (http/sse)"
            ))),
            _ => Ok(()),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, then apply
    /// environment overrides.
    ///
    /// Priority: env vars > config file > defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `STEWARD_*` variables, falling back to the bare `API_KEY` /
    /// `BASE_URL` names.
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("STEWARD_API_KEY").or_else(|| non_empty("API_KEY")) {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = non_empty("STEWARD_BASE_URL").or_else(|| non_empty("BASE_URL")) {
            self.provider.base_url = url;
        }
        if let Some(model) = non_empty("STEWARD_MODEL") {
            self.model.name = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".steward")
    }

    /// The effective working-directory root.
    pub fn working_dir(&self) -> PathBuf {
        let cwd = self.cwd.clone().unwrap_or_else(|| PathBuf::from("."));
        std::path::absolute(&cwd).unwrap_or(cwd)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "model.temperature must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}"
            )));
        }

        if self.model.context_window == 0 {
            return Err(ConfigError::ValidationError(
                "model.context_window must be > 0".into(),
            ));
        }

        if self.max_turns == 0 {
            return Err(ConfigError::ValidationError("max_turns must be > 0".into()));
        }

        if let Some(cwd) = &self.cwd
            && !cwd.is_dir()
        {
            return Err(ConfigError::ValidationError(format!(
                "Working directory does not exist: {}",
                cwd.display()
            )));
        }

        for hook in &self.hooks {
            if hook.command.is_none() && hook.script.is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "Hook '{}' must have either 'command' or 'script'",
                    hook.name
                )));
            }
        }

        for (name, server) in &self.mcp_servers {
            server.validate(name)?;
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            provider: ProviderSettings::default(),
            cwd: None,
            approval: ApprovalPolicy::default(),
            max_turns: default_max_turns(),
            shell_environment: ShellEnvironmentPolicy::default(),
            hooks_enabled: false,
            hooks: vec![],
            mcp_servers: HashMap::new(),
            allowed_tools: None,
            developer_instructions: None,
            user_instructions: None,
            debug: false,
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
