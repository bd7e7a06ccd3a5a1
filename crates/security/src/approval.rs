//! Approval manager — decides whether a requested action may proceed.
//!
//! The decision is a pure function of the configured [`ApprovalPolicy`]
//! and an [`ApprovalContext`] describing the action. It runs as an ordered
//! pipeline where the first rule that resolves wins:
//!
//! 0. Read-only actions are always approved.
//! 1. Shell commands are classified by [`assess_command_safety`]; anything
//!    other than "needs confirmation" is final.
//! 2. Mutations touching paths outside the working-directory root need a
//!    human.
//! 3. Tool-declared hazards need a human unless the policy is `yolo`.
//! 4. Everything else is approved (or still needs confirmation if step 1
//!    asked for it).

use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use steward_config::ApprovalPolicy;
use steward_core::{Tool, ToolConfirmation, ToolInvocation};

use crate::path::is_within_root;

/// Outcome of the approval pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    NeedsConfirmation,
}

/// Everything the policy needs to know about one action.
#[derive(Debug, Clone)]
pub struct ApprovalContext {
    pub tool_name: String,
    pub params: Value,
    pub is_mutating: bool,
    pub affected_paths: Vec<PathBuf>,
    pub command: Option<String>,
    pub is_dangerous: bool,
}

impl ApprovalContext {
    /// Build the context for `tool` about to run `invocation`.
    pub fn from_tool(tool: &dyn Tool, invocation: &ToolInvocation) -> Self {
        Self {
            tool_name: tool.name().to_string(),
            params: invocation.params.clone(),
            is_mutating: tool.is_mutating(&invocation.params),
            affected_paths: tool.affected_paths(invocation),
            command: tool.shell_command(&invocation.params),
            is_dangerous: tool.is_dangerous(&invocation.params),
        }
    }
}

/// Asks a human whether an action may proceed.
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    /// Returns `true` to approve. May wait indefinitely for input; callers
    /// cancel by dropping the future.
    async fn confirm(&self, confirmation: &ToolConfirmation) -> bool;
}

/// Always rejected, regardless of policy (except `yolo`).
const DANGEROUS_COMMAND_PATTERNS: &[&str] = &[
    // Filesystem destruction
    r"rm\s+(-rf?|--recursive)\s+[/~]",
    r"rm\s+-rf?\s+\*",
    r"rmdir\s+[/~]",
    // Disk operations
    r"dd\s+if=",
    r"mkfs",
    r"fdisk",
    r"parted",
    // System control
    r"shutdown",
    r"reboot",
    r"halt",
    r"poweroff",
    r"init\s+[06]",
    // Permission changes on root
    r"chmod\s+(-R\s+)?777\s+[/~]",
    r"chown\s+-R\s+.*\s+[/~]",
    // Network listeners
    r"nc\s+-l",
    r"netcat\s+-l",
    // Piping downloads into a shell
    r"curl\s+.*\|\s*(bash|sh)",
    r"wget\s+.*\|\s*(bash|sh)",
    // Fork bomb
    r":\(\)\s*\{\s*:\|:&\s*\}\s*;",
];

/// Read-only information and dev-tool commands that may run unprompted.
const SAFE_COMMAND_PATTERNS: &[&str] = &[
    r"^(ls|dir|pwd|cd|echo|cat|head|tail|less|more|wc)(\s|$)",
    r"^(find|locate|which|whereis|file|stat)(\s|$)",
    r"^git\s+(status|log|diff|show|branch|remote|tag)(\s|$)",
    r"^(npm|yarn|pnpm)\s+(list|ls|outdated)(\s|$)",
    r"^pip\s+(list|show|freeze)(\s|$)",
    r"^cargo\s+(tree|search)(\s|$)",
    r"^(grep|awk|sed|cut|sort|uniq|tr|diff|comm)(\s|$)",
    r"^(date|cal|uptime|whoami|id|groups|hostname|uname)(\s|$)",
    r"^(env|printenv|set)$",
    r"^(ps|top|htop|pgrep)(\s|$)",
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("command pattern should be valid"))
        .collect()
}

static DANGEROUS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(DANGEROUS_COMMAND_PATTERNS));
static SAFE: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(SAFE_COMMAND_PATTERNS));

/// Whether `command` matches any dangerous pattern anywhere in its text.
pub fn is_dangerous_command(command: &str) -> bool {
    DANGEROUS.iter().any(|re| re.is_match(command))
}

/// Whether `command` is safe-listed.
///
/// Compound commands (`;`, `&&`, `||`, `|`, `&`, newlines) are safe only
/// if every segment is. Output redirection and command substitution are
/// never safe.
pub fn is_safe_command(command: &str) -> bool {
    if command.contains('>') || command.contains("$(") || command.contains('`') {
        return false;
    }

    let mut segments = command
        .split([';', '|', '&', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .peekable();

    if segments.peek().is_none() {
        return false;
    }
    segments.all(|segment| SAFE.iter().any(|re| re.is_match(segment)))
}

/// Classify a shell command under `policy`.
pub fn assess_command_safety(command: &str, policy: ApprovalPolicy) -> ApprovalDecision {
    if policy == ApprovalPolicy::Yolo {
        return ApprovalDecision::Approved;
    }

    if is_dangerous_command(command) {
        return ApprovalDecision::Rejected;
    }

    match policy {
        ApprovalPolicy::Never => {
            if is_safe_command(command) {
                ApprovalDecision::Approved
            } else {
                ApprovalDecision::Rejected
            }
        }
        ApprovalPolicy::Auto | ApprovalPolicy::OnFailure => ApprovalDecision::Approved,
        ApprovalPolicy::AutoEdit | ApprovalPolicy::OnRequest | ApprovalPolicy::Yolo => {
            if is_safe_command(command) {
                ApprovalDecision::Approved
            } else {
                ApprovalDecision::NeedsConfirmation
            }
        }
    }
}

/// Applies the approval policy and, when asked to, defers to a human.
pub struct ApprovalManager {
    policy: ApprovalPolicy,
    cwd: PathBuf,
    handler: Option<Arc<dyn ConfirmationHandler>>,
}

impl ApprovalManager {
    pub fn new(policy: ApprovalPolicy, cwd: impl Into<PathBuf>) -> Self {
        Self {
            policy,
            cwd: cwd.into(),
            handler: None,
        }
    }

    /// Attach the human-confirmation collaborator.
    pub fn with_handler(mut self, handler: Arc<dyn ConfirmationHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn policy(&self) -> ApprovalPolicy {
        self.policy
    }

    pub fn cwd(&self) -> &std::path::Path {
        &self.cwd
    }

    /// Run the approval pipeline for one action.
    pub fn check_approval(&self, context: &ApprovalContext) -> ApprovalDecision {
        let decision = self.decide(context);
        match decision {
            ApprovalDecision::Rejected => warn!(
                tool = %context.tool_name,
                command = context.command.as_deref().unwrap_or(""),
                policy = %self.policy,
                "Action rejected by approval policy"
            ),
            _ => debug!(
                tool = %context.tool_name,
                policy = %self.policy,
                decision = ?decision,
                "Approval decision"
            ),
        }
        decision
    }

    fn decide(&self, context: &ApprovalContext) -> ApprovalDecision {
        if !context.is_mutating {
            return ApprovalDecision::Approved;
        }

        let mut pending = false;
        if let Some(command) = &context.command {
            match assess_command_safety(command, self.policy) {
                ApprovalDecision::NeedsConfirmation => pending = true,
                resolved => return resolved,
            }
        }

        if context
            .affected_paths
            .iter()
            .any(|path| !is_within_root(path, &self.cwd))
        {
            return ApprovalDecision::NeedsConfirmation;
        }

        if context.is_dangerous {
            return if self.policy == ApprovalPolicy::Yolo {
                ApprovalDecision::Approved
            } else {
                ApprovalDecision::NeedsConfirmation
            };
        }

        if pending {
            ApprovalDecision::NeedsConfirmation
        } else {
            ApprovalDecision::Approved
        }
    }

    /// Ask the confirmation handler; approves when none is configured.
    pub async fn request_confirmation(&self, confirmation: &ToolConfirmation) -> bool {
        match &self.handler {
            Some(handler) => {
                let approved = handler.confirm(confirmation).await;
                debug!(tool = %confirmation.tool_name, approved, "Confirmation answered");
                approved
            }
            None => true,
        }
    }
}
