//! Agent lifecycle events.
//!
//! A run emits exactly one `Start`, then any number of text and tool
//! events, then exactly one `End`. Front-ends consume them from a
//! `tokio::sync::mpsc` channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The run began with this user message.
    Start { message: String },

    /// Partial text from the model.
    TextDelta { content: String },

    /// The model finished a text response.
    TextComplete { content: String },

    /// A tool call is about to go through approval and execution.
    ToolCallStart {
        call_id: String,
        name: String,
        arguments: Value,
    },

    /// A tool call finished, was refused, or failed.
    ToolCallComplete {
        call_id: String,
        name: String,
        success: bool,
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default)]
        truncated: bool,
    },

    /// Something went wrong; the run ends after this.
    Error { message: String },

    /// The run is over.
    End { response: Option<String> },
}

impl AgentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::TextDelta { .. } => "text_delta",
            Self::TextComplete { .. } => "text_complete",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolCallComplete { .. } => "tool_call_complete",
            Self::Error { .. } => "error",
            Self::End { .. } => "end",
        }
    }
}
