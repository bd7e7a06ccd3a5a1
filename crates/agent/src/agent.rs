//! The agent loop implementation.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use steward_config::AppConfig;
use steward_core::message::{Message, MessageToolCall};
use steward_core::provider::{Provider, ProviderRequest, StreamEvent};
use steward_core::tool::{ToolInvocation, ToolRegistry, ToolResult};
use steward_security::{ApprovalContext, ApprovalDecision, ApprovalManager};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::compaction::ChatCompactor;
use crate::event::AgentEvent;
use crate::loop_detector::LoopDetector;
use crate::token;

/// Fraction of the context window at which history is compacted.
pub const COMPACTION_THRESHOLD: f64 = 0.8;

const BASE_SYSTEM_PROMPT: &str = "\
You are Steward, an autonomous task agent working in a terminal on the user's machine. \
You complete tasks by calling the tools available to you and then report back concisely.

Guidelines:
- Read files before you change them.
- Prefer small steps whose results you can check.
- Some actions need the user's approval. If an action is rejected or denied, \
do not retry it unchanged; choose another approach or ask the user.
- When the task is done, reply with a short summary of what you did.";

/// Build the system prompt from the configured instruction layers.
pub fn system_prompt(config: &AppConfig, cwd: &Path) -> String {
    let mut prompt = format!("{BASE_SYSTEM_PROMPT}\n\nWorking directory: {}", cwd.display());
    if let Some(instructions) = config.developer_instructions.as_deref()
        && !instructions.trim().is_empty()
    {
        prompt.push_str("\n\n# Developer instructions\n");
        prompt.push_str(instructions.trim());
    }
    if let Some(instructions) = config.user_instructions.as_deref()
        && !instructions.trim().is_empty()
    {
        prompt.push_str("\n\n# User instructions\n");
        prompt.push_str(instructions.trim());
    }
    prompt
}

/// Per-agent knobs, usually derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f32,
    pub context_window: u32,
    pub max_turns: usize,
    /// Tools resolve relative paths against this directory
    pub cwd: PathBuf,
    pub system_prompt: Option<String>,
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let cwd = config.working_dir();
        Self {
            model: config.model.name.clone(),
            temperature: config.model.temperature,
            context_window: config.model.context_window,
            max_turns: config.max_turns,
            system_prompt: Some(system_prompt(config, &cwd)),
            cwd,
        }
    }
}

/// The event consumer went away; nothing more will be emitted.
struct Abandoned;

async fn emit(events: &mpsc::Sender<AgentEvent>, event: AgentEvent) -> Result<(), Abandoned> {
    events.send(event).await.map_err(|_| Abandoned)
}

fn parse_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| format!("Invalid JSON arguments: {e}"))
}

struct TurnOutput {
    text: String,
    tool_calls: Vec<MessageToolCall>,
}

/// Sequences model calls, tool calls and safety checks for one task.
///
/// History persists across `run` calls, so an interactive front-end can
/// keep one agent for the whole session.
pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    approval: ApprovalManager,
    settings: AgentSettings,
    history: Vec<Message>,
    loop_detector: LoopDetector,
    compactor: ChatCompactor,
    /// Prompt tokens the provider reported for the latest request
    last_prompt_tokens: u32,
    closed: bool,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        approval: ApprovalManager,
        settings: AgentSettings,
    ) -> Self {
        let history = settings
            .system_prompt
            .iter()
            .map(|prompt| Message::system(prompt.clone()))
            .collect();
        let compactor = ChatCompactor::new(provider.clone(), settings.model.clone());
        Self {
            provider,
            tools,
            approval,
            settings,
            history,
            loop_detector: LoopDetector::new(),
            compactor,
            last_prompt_tokens: 0,
            closed: false,
        }
    }

    pub fn with_loop_detector(mut self, loop_detector: LoopDetector) -> Self {
        self.loop_detector = loop_detector;
        self
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run one task to completion, streaming lifecycle events to `events`.
    ///
    /// Returns the last text response of the run. If the receiving end of
    /// `events` is dropped, the run stops at the next emission.
    pub async fn run(
        &mut self,
        message: &str,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Option<String> {
        info!(provider = self.provider.name(), model = %self.settings.model, "Starting agent run");

        if emit(events, AgentEvent::Start { message: message.to_string() })
            .await
            .is_err()
        {
            return None;
        }
        self.loop_detector.clear();
        self.history.push(Message::user(message));

        match self.agentic_loop(events).await {
            Ok(response) => {
                let _ = emit(events, AgentEvent::End { response: response.clone() }).await;
                response
            }
            Err(Abandoned) => {
                debug!("Event receiver dropped, abandoning run");
                None
            }
        }
    }

    async fn agentic_loop(
        &mut self,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Result<Option<String>, Abandoned> {
        let mut final_response = None;

        for turn in 1..=self.settings.max_turns {
            debug!(turn, messages = self.history.len(), "Starting turn");

            let Some(TurnOutput { text, tool_calls }) = self.stream_turn(events).await? else {
                return Ok(final_response);
            };

            if !text.is_empty() {
                emit(events, AgentEvent::TextComplete { content: text.clone() }).await?;
                self.loop_detector.record_response(&text);
                final_response = Some(text.clone());
            }
            if tool_calls.is_empty() {
                self.history.push(Message::assistant(text));
                return Ok(final_response);
            }

            // The assistant message and its results enter history together.
            let mut batch = Vec::with_capacity(tool_calls.len() + 1);
            batch.push(Message::assistant_with_tools(text, tool_calls.clone()));
            for call in &tool_calls {
                batch.push(self.handle_tool_call(call, events).await?);
            }
            self.history.extend(batch);

            if let Some(reason) = self.loop_detector.check_for_loop() {
                warn!(reason = %reason, "Loop detected, stopping run");
                emit(events, AgentEvent::Error { message: format!("Loop detected: {reason}") }).await?;
                return Ok(final_response);
            }

            self.maybe_compact().await;
        }

        warn!(max_turns = self.settings.max_turns, "Turn limit reached");
        emit(
            events,
            AgentEvent::Error {
                message: format!("Maximum turns ({}) reached", self.settings.max_turns),
            },
        )
        .await?;
        Ok(final_response)
    }

    /// Stream one model response. `Ok(None)` means the turn failed and an
    /// error event has already been emitted.
    async fn stream_turn(
        &mut self,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Result<Option<TurnOutput>, Abandoned> {
        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages: self.history.clone(),
            temperature: self.settings.temperature,
            max_tokens: None,
            tools: self.tools.definitions(),
            stream: true,
        };

        let mut stream = match self.provider.stream(request).await {
            Ok(rx) => rx,
            Err(e) => {
                error!(error = %e, "Model request failed");
                emit(events, AgentEvent::Error { message: e.to_string() }).await?;
                return Ok(None);
            }
        };

        let mut text = String::new();
        while let Some(event) = stream.recv().await {
            match event {
                StreamEvent::TextDelta { text: delta } => {
                    text.push_str(&delta);
                    emit(events, AgentEvent::TextDelta { content: delta }).await?;
                }
                StreamEvent::Error { message } => {
                    warn!(error = %message, "Model stream failed");
                    emit(events, AgentEvent::Error { message }).await?;
                    return Ok(None);
                }
                StreamEvent::MessageComplete {
                    text: full_text,
                    tool_calls,
                    usage,
                    ..
                } => {
                    // Non-streaming providers deliver the text in one piece.
                    if text.is_empty()
                        && let Some(full_text) = full_text
                        && !full_text.is_empty()
                    {
                        emit(events, AgentEvent::TextDelta { content: full_text.clone() }).await?;
                        text = full_text;
                    }
                    if let Some(usage) = usage {
                        self.last_prompt_tokens = usage.prompt_tokens;
                    }
                    return Ok(Some(TurnOutput { text, tool_calls }));
                }
            }
        }

        warn!("Model stream ended without a terminal event");
        emit(
            events,
            AgentEvent::Error {
                message: "Model stream ended unexpectedly".into(),
            },
        )
        .await?;
        Ok(None)
    }

    async fn handle_tool_call(
        &mut self,
        call: &MessageToolCall,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Result<Message, Abandoned> {
        let parsed = parse_arguments(&call.arguments);
        let arguments = parsed
            .clone()
            .unwrap_or_else(|_| Value::String(call.arguments.clone()));
        emit(
            events,
            AgentEvent::ToolCallStart {
                call_id: call.id.clone(),
                name: call.name.clone(),
                arguments: arguments.clone(),
            },
        )
        .await?;

        let result = match parsed {
            Ok(params) => self.dispatch(&call.name, params).await,
            Err(message) => ToolResult::failure(message),
        };

        emit(
            events,
            AgentEvent::ToolCallComplete {
                call_id: call.id.clone(),
                name: call.name.clone(),
                success: result.success,
                output: result.output.clone(),
                error: result.error.clone(),
                truncated: result.truncated,
            },
        )
        .await?;

        self.loop_detector.record_tool_call(&call.name, &arguments);
        Ok(Message::tool_result(&call.id, result.to_model_output()))
    }

    /// Route one call through approval and the registry.
    async fn dispatch(&self, name: &str, params: Value) -> ToolResult {
        let cwd = self.settings.cwd.as_path();

        // Invalid or unknown calls skip approval; the registry reports them.
        if let Some(tool) = self.tools.get(name)
            && tool.validate_params(&params).is_empty()
        {
            let invocation = ToolInvocation::new(params.clone(), cwd);
            let context = ApprovalContext::from_tool(tool, &invocation);
            match self.approval.check_approval(&context) {
                ApprovalDecision::Approved => {}
                ApprovalDecision::Rejected => {
                    return ToolResult::failure(format!(
                        "Action rejected by approval policy ({})",
                        self.approval.policy()
                    ));
                }
                ApprovalDecision::NeedsConfirmation => {
                    let confirmation = tool.confirmation(&invocation);
                    if !self.approval.request_confirmation(&confirmation).await {
                        info!(tool = %name, "Action denied by user");
                        return ToolResult::failure("Action denied by user");
                    }
                }
            }
        }

        self.tools.invoke(name, params, Some(cwd)).await
    }

    /// Replace history with a summary once it nears the context window.
    async fn maybe_compact(&mut self) {
        let threshold = (f64::from(self.settings.context_window) * COMPACTION_THRESHOLD) as usize;
        let estimated = token::estimate_messages_tokens(&self.history)
            + token::estimate_tools_tokens(&self.tools.definitions());
        let used = estimated.max(self.last_prompt_tokens as usize);
        if used < threshold {
            return;
        }

        info!(used, threshold, "Context nearly full, compacting history");
        let Some(compacted) = self.compactor.compress(&self.history).await else {
            return;
        };

        let mut history: Vec<Message> = self
            .history
            .iter()
            .filter(|m| m.role == steward_core::message::Role::System)
            .cloned()
            .collect();
        history.push(Message::user(format!(
            "This session continues from an earlier conversation that was summarized \
             to save space. Summary:\n\n{}",
            compacted.summary
        )));
        debug!(before = self.history.len(), after = history.len(), "History compacted");
        self.history = history;
        self.last_prompt_tokens = 0;
    }

    /// Release the provider connection. Later runs fail with a
    /// client-closed error.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.provider.close().await;
        debug!("Agent closed");
    }
}
