//! Shared test helpers for agent tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use steward_core::error::ProviderError;
use steward_core::message::{Message, MessageToolCall};
use steward_core::provider::{
    Provider, ProviderRequest, ProviderResponse, StreamEvent, TokenUsage,
};
use tokio::sync::mpsc;

/// One scripted reply.
pub enum Script {
    /// A complete response (a single `MessageComplete` when streamed).
    Complete(ProviderResponse),
    /// Raw stream events, delivered in order.
    Stream(Vec<StreamEvent>),
    /// The request itself fails.
    Fail(String),
}

/// A mock provider that replays a sequence of scripted replies, one per
/// request, and records every request it receives.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
    closes: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn next(&self, request: ProviderRequest) -> Result<Script, ProviderError> {
        if self.close_count() > 0 {
            return Err(ProviderError::ClientClosed("client has been closed".into()));
        }
        self.requests.lock().unwrap().push(request);
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::InvalidResponse("no more scripted responses".into()))
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next(request)? {
            Script::Complete(response) => Ok(response),
            Script::Fail(message) => Err(ProviderError::Network(message)),
            Script::Stream(_) => Err(ProviderError::InvalidResponse(
                "stream scripted for a complete request".into(),
            )),
        }
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        let events = match self.next(request)? {
            Script::Complete(response) => vec![response.into_stream_event()],
            Script::Stream(events) => events,
            Script::Fail(message) => return Err(ProviderError::Network(message)),
        };
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            let _ = tx.try_send(event);
        }
        Ok(rx)
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn usage() -> TokenUsage {
    TokenUsage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
        cached_tokens: 0,
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(usage()),
        model: "mock-model".into(),
        finish_reason: Some("stop".into()),
    }
}

/// Create a response with tool calls and optional leading text.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tools(text, tool_calls),
        usage: Some(usage()),
        model: "mock-model".into(),
        finish_reason: Some("tool_calls".into()),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}
