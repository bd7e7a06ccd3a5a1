//! Conversation compaction via model-assisted summarization.
//!
//! When history approaches the context window, the non-system messages
//! are rendered into one digest (each role truncated to its own budget)
//! and sent to the model with a summarization prompt. The summary then
//! replaces the history. Failure here is never fatal: the caller keeps
//! the uncompacted history.

use std::sync::Arc;
use steward_core::message::{Message, Role};
use steward_core::provider::{Provider, ProviderRequest, TokenUsage};
use tracing::{debug, warn};

pub const TOOL_OUTPUT_BUDGET: usize = 2000;
pub const ASSISTANT_BUDGET: usize = 3000;
pub const TOOL_ARGS_BUDGET: usize = 200;
pub const USER_BUDGET: usize = 2000;

const DIGEST_HEADER: &str = "Here is the conversation that needs to be continued:\n";
const SECTION_SEPARATOR: &str = "\n\n---\n\n";
const MIN_MESSAGES: usize = 3;

const COMPRESSION_PROMPT: &str = "\
You are summarizing a conversation between a user and an autonomous task agent \
so the agent can continue the task with a fresh context.

Write a concise summary that preserves:
- the user's original goal and any constraints they stated
- what has been done so far, including files read or changed and commands run
- important results, errors and decisions
- what remains to be done next

Refer to files, commands and identifiers exactly. Do not invent progress. \
Write the summary as notes to yourself; do not address the user.";

/// The outcome of a successful compaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionSummary {
    pub summary: String,
    pub usage: TokenUsage,
}

pub struct ChatCompactor {
    provider: Arc<dyn Provider>,
    model: String,
}

/// Cut `text` to `max_chars` characters. Returns the kept prefix and
/// whether anything was dropped.
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => (&text[..end], true),
        None => (text, false),
    }
}

fn budgeted(text: &str, max_chars: usize, marker: &str) -> String {
    match truncate_chars(text, max_chars) {
        (kept, true) => format!("{kept}\n{marker}"),
        (kept, false) => kept.to_string(),
    }
}

/// Render history as a single digest for the summarizer.
pub fn format_history(messages: &[Message]) -> String {
    let mut sections = vec![DIGEST_HEADER.to_string()];

    for msg in messages {
        match msg.role {
            Role::System => {}
            Role::Tool => {
                let id = msg.tool_call_id.as_deref().unwrap_or("unknown");
                sections.push(format!(
                    "[Tool Result ({id})]:\n{}",
                    budgeted(&msg.content, TOOL_OUTPUT_BUDGET, "... [tool output truncated]")
                ));
            }
            Role::Assistant => {
                if !msg.content.is_empty() {
                    sections.push(format!(
                        "Assistant:\n{}",
                        budgeted(&msg.content, ASSISTANT_BUDGET, "... [response truncated]")
                    ));
                }
                if !msg.tool_calls.is_empty() {
                    let calls: Vec<String> = msg
                        .tool_calls
                        .iter()
                        .map(|c| {
                            let (args, _) = truncate_chars(&c.arguments, TOOL_ARGS_BUDGET);
                            format!("  - {}({args})", c.name)
                        })
                        .collect();
                    sections.push(format!("Assistant called tools:\n{}", calls.join("\n")));
                }
            }
            Role::User => {
                sections.push(format!(
                    "User:\n{}",
                    budgeted(&msg.content, USER_BUDGET, "... [message truncated]")
                ));
            }
        }
    }

    sections.join(SECTION_SEPARATOR)
}

impl ChatCompactor {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Summarize `messages`. Returns `None` when there is too little
    /// history or the summarizer fails; the reason is logged.
    pub async fn compress(&self, messages: &[Message]) -> Option<CompactionSummary> {
        if messages.len() < MIN_MESSAGES {
            debug!(messages = messages.len(), "Too little history to compact");
            return None;
        }

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(COMPRESSION_PROMPT),
                Message::user(format_history(messages)),
            ],
            temperature: 0.0,
            max_tokens: None,
            tools: Vec::new(),
            stream: false,
        };

        let response = match self.provider.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(reason = %e, "Compaction request failed");
                return None;
            }
        };

        let summary = response.message.content.trim().to_string();
        if summary.is_empty() {
            warn!(reason = "empty summary", "Compaction produced no summary");
            return None;
        }
        let Some(usage) = response.usage else {
            warn!(reason = "missing usage", "Compaction response reported no usage");
            return None;
        };

        debug!(
            messages = messages.len(),
            summary_chars = summary.len(),
            prompt_tokens = usage.prompt_tokens,
            "Compacted conversation"
        );
        Some(CompactionSummary { summary, usage })
    }
}
