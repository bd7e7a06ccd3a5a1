//! Provider trait — the abstraction over language model backends.
//!
//! A Provider knows how to send a conversation to a model and get a
//! response back, either as one complete message or as a stream of
//! [`StreamEvent`]s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::{Message, MessageToolCall};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "anthropic/claude-sonnet-4", "gpt-4o")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 2.0 = most random)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

fn default_temperature() -> f32 {
    1.0
}

/// A tool definition sent to the model so it knows what it can call.
///
/// Serializes to the model-facing function schema:
/// `{name, description, parameters: {type: "object", properties, required}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(default)]
    pub cached_tokens: u32,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<TokenUsage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Why generation stopped ("stop", "tool_calls", "length", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl ProviderResponse {
    /// Collapse a complete response into the single `MessageComplete`
    /// event a non-streaming request yields.
    pub fn into_stream_event(self) -> StreamEvent {
        let text = if self.message.content.is_empty() {
            None
        } else {
            Some(self.message.content)
        };
        StreamEvent::MessageComplete {
            text,
            tool_calls: self.message.tool_calls,
            usage: self.usage,
            finish_reason: self.finish_reason,
        }
    }
}

/// One unit of model output.
///
/// A stream is finite and terminated by exactly one `Error` or
/// `MessageComplete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Partial text, in receipt order.
    TextDelta { text: String },

    /// The stream failed; no further events follow.
    Error { message: String },

    /// The response finished.
    MessageComplete {
        /// Full text when the provider reports it in one piece
        /// (non-streaming); `None` when it was delivered as deltas.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<MessageToolCall>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

impl StreamEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::MessageComplete { .. })
    }
}

/// The core Provider trait.
///
/// The agent loop calls `stream()` for conversation turns and `complete()`
/// for side requests such as summarization, without knowing which backend
/// is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of response events.
    ///
    /// Default implementation calls `complete()` and yields a single
    /// `MessageComplete`.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        let response = self.complete(request).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(response.into_stream_event()).await;
        Ok(rx)
    }

    /// Release the underlying connection. Requests made afterwards must
    /// fail with [`ProviderError::ClientClosed`].
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider;

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant("summary"),
                usage: Some(TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 2,
                    total_tokens: 12,
                    cached_tokens: 0,
                }),
                model: "fixed-model".into(),
                finish_reason: Some("stop".into()),
            })
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "fixed-model".into(),
            messages: vec![Message::user("hi")],
            temperature: default_temperature(),
            max_tokens: None,
            tools: vec![],
            stream: true,
        }
    }

    #[tokio::test]
    async fn default_stream_yields_single_complete_event() {
        let mut rx = FixedProvider.stream(request()).await.unwrap();
        let event = rx.recv().await.unwrap();
        match &event {
            StreamEvent::MessageComplete { text, usage, .. } => {
                assert_eq!(text.as_deref(), Some("summary"));
                assert_eq!(usage.unwrap().total_tokens, 12);
            }
            other => panic!("Expected MessageComplete, got {other:?}"),
        }
        assert!(event.is_terminal());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "shell".into(),
            description: "Execute a shell command".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The command to run" }
                },
                "required": ["command"]
            }),
        };
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["name"], "shell");
        assert_eq!(json["parameters"]["required"][0], "command");
    }

    #[test]
    fn stream_event_tagging() {
        let json = serde_json::to_string(&StreamEvent::TextDelta { text: "a".into() }).unwrap();
        assert_eq!(json, r#"{"type":"text_delta","text":"a"}"#);
        assert!(!StreamEvent::TextDelta { text: "a".into() }.is_terminal());
    }
}
