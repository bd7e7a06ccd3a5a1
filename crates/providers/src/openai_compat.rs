//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any
//! endpoint exposing `/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Tool use / function calling
//! - An explicit connection lifecycle: the HTTP client is created on first
//!   use and, once closed, every later request fails with
//!   [`ProviderError::ClientClosed`] instead of reconnecting.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use steward_config::AppConfig;
use steward_core::error::ProviderError;
use steward_core::message::{Message, MessageToolCall};
use steward_core::provider::*;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

enum ClientState {
    Idle,
    Open(reqwest::Client),
    Closed,
}

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    state: Mutex<ClientState>,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider. No connection is made
    /// until the first request.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            state: Mutex::new(ClientState::Idle),
        }
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Build the provider described by the configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let api_key = config.provider.api_key.clone().ok_or_else(|| {
            ProviderError::AuthenticationFailed(
                "No API key found. Set STEWARD_API_KEY or API_KEY".into(),
            )
        })?;
        let name = if config.provider.base_url.contains("openrouter.ai") {
            "openrouter"
        } else {
            "openai-compatible"
        };
        Ok(Self::new(name, &config.provider.base_url, api_key))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a connection has been opened and not yet closed.
    pub fn is_open(&self) -> bool {
        matches!(
            self.state.lock().as_deref(),
            Ok(ClientState::Open(_))
        )
    }

    /// The shared HTTP client, created on first use.
    fn client(&self) -> Result<reqwest::Client, ProviderError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ProviderError::ClientClosed(self.name.clone()))?;
        match &*state {
            ClientState::Open(client) => Ok(client.clone()),
            ClientState::Closed => Err(ProviderError::ClientClosed(self.name.clone())),
            ClientState::Idle => {
                let client = reqwest::Client::builder()
                    .timeout(REQUEST_TIMEOUT)
                    .connect_timeout(CONNECT_TIMEOUT)
                    .build()
                    .map_err(|e| ProviderError::Network(e.to_string()))?;
                debug!(provider = %self.name, "Opened model client");
                *state = ClientState::Open(client.clone());
                Ok(client)
            }
        }
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls = if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };
                // Assistant turns that only call tools carry no content.
                let content = if tool_calls.is_some() && m.content.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                };
                ApiMessage {
                    role: m.role.as_str().into(),
                    content,
                    tool_calls,
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// POST to `/chat/completions` and map error statuses.
    async fn send(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let client = self.client()?;
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl steward_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let body = Self::request_body(&request, false);
        let response = self.send(&body, false).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let tool_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let message = Message::assistant_with_tools(
            choice.message.content.unwrap_or_default(),
            tool_calls,
        );

        Ok(ProviderResponse {
            message,
            usage: api_response.usage.map(ApiUsage::into_usage),
            model: api_response.model.unwrap_or(request.model),
            finish_reason: choice.finish_reason,
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let body = Self::request_body(&request, true);
        let response = self.send(&body, true).await?;

        let (tx, rx) = mpsc::channel(64);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and parse events
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut parser = SseParser::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error {
                                message: ProviderError::StreamInterrupted(e.to_string())
                                    .to_string(),
                            })
                            .await;
                        return;
                    }
                };

                for event in parser.push(&bytes) {
                    let terminal = event.is_terminal();
                    if tx.send(event).await.is_err() || terminal {
                        return; // receiver dropped or stream finished
                    }
                }
            }

            trace!(provider = %provider_name, "SSE stream ended without [DONE]");
            for event in parser.finish() {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }

    async fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            if matches!(*state, ClientState::Open(_)) {
                debug!(provider = %self.name, "Closed model client");
            }
            *state = ClientState::Closed;
        }
    }
}

/// Incremental parser turning SSE bytes into [`StreamEvent`]s.
///
/// Bytes are buffered until a full line arrives, so a multi-byte
/// character split across network chunks decodes intact. Text deltas are emitted as they arrive; tool-call fragments are
/// accumulated by index and released with the final `MessageComplete`.
#[derive(Default)]
struct SseParser {
    buffer: Vec<u8>,
    tool_calls: BTreeMap<u32, ToolCallAccumulator>,
    finish_reason: Option<String>,
    usage: Option<TokenUsage>,
    done: bool,
}

impl SseParser {
    fn push(&mut self, chunk: impl AsRef<[u8]>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }
        self.buffer.extend_from_slice(chunk.as_ref());

        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);

            // Skip empty lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                events.push(self.complete());
                return events;
            }

            match serde_json::from_str::<StreamResponse>(data) {
                Ok(chunk) => {
                    if let Some(error) = chunk.error {
                        self.done = true;
                        events.push(StreamEvent::Error {
                            message: error.message,
                        });
                        return events;
                    }
                    self.absorb(chunk, &mut events);
                }
                Err(e) => {
                    trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                }
            }
        }
        events
    }

    fn absorb(&mut self, chunk: StreamResponse, events: &mut Vec<StreamEvent>) {
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage.into_usage());
        }

        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
            for delta in choice.delta.tool_calls.unwrap_or_default() {
                let acc = self.tool_calls.entry(delta.index).or_default();
                if let Some(id) = delta.id {
                    acc.id = id;
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        acc.name = name;
                    }
                    if let Some(args) = function.arguments {
                        acc.arguments.push_str(&args);
                    }
                }
            }
            if let Some(text) = choice.delta.content
                && !text.is_empty()
            {
                events.push(StreamEvent::TextDelta { text });
            }
        }
    }

    fn complete(&mut self) -> StreamEvent {
        self.done = true;
        StreamEvent::MessageComplete {
            text: None,
            tool_calls: std::mem::take(&mut self.tool_calls)
                .into_values()
                .map(ToolCallAccumulator::into_tool_call)
                .collect(),
            usage: self.usage.take(),
            finish_reason: self.finish_reason.take(),
        }
    }

    /// Flush any unterminated line once the byte stream is exhausted and
    /// make sure the sequence ends with a terminal event.
    fn finish(mut self) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }
        let mut events = self.push("\n");
        if !events.last().is_some_and(StreamEvent::is_terminal) {
            events.push(self.complete());
        }
        events
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
    #[serde(default)]
    prompt_tokens_details: Option<ApiPromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct ApiPromptTokensDetails {
    #[serde(default)]
    cached_tokens: u32,
}

impl ApiUsage {
    fn into_usage(self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
            cached_tokens: self.prompt_tokens_details.map_or(0, |d| d.cached_tokens),
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta; arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Accumulates incremental tool call deltas into a complete tool call.
#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_tool_call(self) -> MessageToolCall {
        MessageToolCall {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::Provider;

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "test-model".into(),
            messages: vec![Message::user("hi")],
            temperature: 1.0,
            max_tokens: None,
            tools: vec![],
            stream: false,
        }
    }

    #[test]
    fn openrouter_constructor() {
        let provider = OpenAiCompatProvider::openrouter("sk-test");
        assert_eq!(provider.name(), "openrouter");
        assert!(provider.base_url().contains("openrouter.ai"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::ollama(Some("http://localhost:11434/v1/"));
        assert_eq!(provider.base_url(), "http://localhost:11434/v1");
    }

    #[test]
    fn from_config_requires_api_key() {
        let mut config = AppConfig::default();
        assert!(matches!(
            OpenAiCompatProvider::from_config(&config),
            Err(ProviderError::AuthenticationFailed(_))
        ));
        config.provider.api_key = Some("sk-test".into());
        let provider = OpenAiCompatProvider::from_config(&config).unwrap();
        assert_eq!(provider.name(), "openrouter");
    }

    #[test]
    fn client_is_created_lazily() {
        let provider = OpenAiCompatProvider::openrouter("sk-test");
        assert!(!provider.is_open());
        provider.client().unwrap();
        assert!(provider.is_open());
    }

    #[tokio::test]
    async fn closed_client_fails_explicitly() {
        let provider = OpenAiCompatProvider::openrouter("sk-test");
        provider.client().unwrap();
        provider.close().await;
        provider.close().await;
        assert!(!provider.is_open());

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::ClientClosed(ref name) if name == "openrouter"));
        let err = provider.stream(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::ClientClosed(_)));
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let msg = Message::assistant_with_tools(
            "",
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "shell".into(),
                arguments: r#"{"command":"ls"}"#.into(),
            }],
        );
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "shell");
        assert!(api_msgs[0].content.is_none());
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", "result data");
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn request_body_shape() {
        let mut req = request();
        req.tools = vec![ToolDefinition {
            name: "shell".into(),
            description: "Run a shell command".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let body = OpenAiCompatProvider::request_body(&req, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "shell");

        let body = OpenAiCompatProvider::request_body(&request(), false);
        assert!(body.get("stream_options").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn parse_non_streaming_usage_with_cache() {
        let data = r#"{
            "model": "m",
            "choices": [{"message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12,
                      "prompt_tokens_details": {"cached_tokens": 4}}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let usage = parsed.usage.unwrap().into_usage();
        assert_eq!(usage.total_tokens, 12);
        assert_eq!(usage.cached_tokens, 4);
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    // --- SSE parsing tests ---

    #[test]
    fn sse_text_deltas_in_order() {
        let mut parser = SseParser::default();
        let events = parser.push(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        ));
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta { text: "Hel".into() },
                StreamEvent::TextDelta { text: "lo".into() },
            ]
        );
    }

    #[test]
    fn sse_lines_split_across_chunks() {
        let mut parser = SseParser::default();
        assert!(parser.push("data: {\"choices\":[{\"delta\":{\"con").is_empty());
        let events = parser.push("tent\":\"x\"}}]}\r\n");
        assert_eq!(events, vec![StreamEvent::TextDelta { text: "x".into() }]);
    }

    #[test]
    fn sse_multibyte_char_split_across_chunks() {
        let mut parser = SseParser::default();
        let mut first = b"data: {\"choices\":[{\"delta\":{\"content\":\"caf".to_vec();
        first.push(0xC3);
        assert!(parser.push(&first).is_empty());

        let mut second = vec![0xA9];
        second.extend_from_slice(b"\"}}]}\n");
        let events = parser.push(&second);
        assert_eq!(events, vec![StreamEvent::TextDelta { text: "café".into() }]);
    }

    #[test]
    fn sse_tool_calls_accumulate_until_done() {
        let mut parser = SseParser::default();
        let mut events = parser.push(concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"function\":{\"name\":\"shell\",\"arguments\":\"\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"command\\\":\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"ls\\\"}\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5,\"total_tokens\":15}}\n",
            "data: [DONE]\n",
        ));
        assert_eq!(events.len(), 1);
        match events.remove(0) {
            StreamEvent::MessageComplete {
                text,
                tool_calls,
                usage,
                finish_reason,
            } => {
                assert!(text.is_none());
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].id, "call_a");
                assert_eq!(tool_calls[0].arguments, r#"{"command":"ls"}"#);
                assert_eq!(usage.unwrap().total_tokens, 15);
                assert_eq!(finish_reason.as_deref(), Some("tool_calls"));
            }
            other => panic!("Expected MessageComplete, got {other:?}"),
        }
        assert!(parser.push("data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n").is_empty());
    }

    #[test]
    fn sse_tool_calls_ordered_by_index() {
        let mut parser = SseParser::default();
        parser.push(concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":1,\"id\":\"call_b\",\"function\":{\"name\":\"glob\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"function\":{\"name\":\"shell\"}}]}}]}\n",
        ));
        match parser.finish().remove(0) {
            StreamEvent::MessageComplete { tool_calls, .. } => {
                let ids: Vec<_> = tool_calls.iter().map(|tc| tc.id.as_str()).collect();
                assert_eq!(ids, vec!["call_a", "call_b"]);
            }
            other => panic!("Expected MessageComplete, got {other:?}"),
        }
    }

    #[test]
    fn sse_error_payload_terminates() {
        let mut parser = SseParser::default();
        let events = parser.push("data: {\"error\":{\"message\":\"upstream overloaded\"}}\n");
        assert_eq!(
            events,
            vec![StreamEvent::Error {
                message: "upstream overloaded".into()
            }]
        );
    }

    #[test]
    fn sse_ignores_comments_and_garbage() {
        let mut parser = SseParser::default();
        let events = parser.push(": OPENROUTER PROCESSING\n\ndata: not-json\nevent: ping\n");
        assert!(events.is_empty());
    }

    #[test]
    fn sse_finish_flushes_unterminated_line() {
        let mut parser = SseParser::default();
        parser.push("data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":1,\"total_tokens\":4}}");
        let mut events = parser.finish();
        assert_eq!(events.len(), 1);
        match events.remove(0) {
            StreamEvent::MessageComplete { usage, .. } => {
                assert_eq!(usage.unwrap().prompt_tokens, 3);
            }
            other => panic!("Expected MessageComplete, got {other:?}"),
        }
    }
}
