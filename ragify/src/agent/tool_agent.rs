//! The tool-calling dispatcher.

use super::{Agent, AgentSession, ToolCallRecord};
use crate::config::RagConfig;
use crate::core::AgentState;
use crate::errors::{AgentError, ToolLoopExceededError, UnknownToolError};
use crate::events::{self, EventSink};
use crate::providers::{GenerationRequest, LanguageModel, ModelReply};
use crate::tools::{get_tool_registry, ToolRegistry};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default bound on tool-call rounds per [`ask`](Agent::ask).
pub const DEFAULT_MAX_TOOL_CALLS: usize = 5;

/// Drives a language model through a bounded tool-calling loop.
///
/// Each `ask` appends the user turn, then alternates between model calls and
/// tool execution until the model answers in plain text. Every requested
/// tool name is resolved before any tool in that round runs, and a round's
/// turns are recorded only once every call in it has succeeded, so a failed
/// round leaves no partial history behind.
pub struct ToolAgent {
    llm: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    system_prompt: Option<String>,
    max_tool_calls: usize,
    temperature: f64,
    max_tokens: u32,
    event_sink: Option<Arc<dyn EventSink>>,
    session: AgentSession,
    trace: Vec<ToolCallRecord>,
}

impl fmt::Debug for ToolAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolAgent")
            .field("model", &self.llm.model_id())
            .field("tools", &self.tools.names())
            .field("max_tool_calls", &self.max_tool_calls)
            .field("session", &self.session.id())
            .finish_non_exhaustive()
    }
}

impl ToolAgent {
    /// Creates an agent with the default limits and no system prompt.
    #[must_use]
    pub fn new(llm: Arc<dyn LanguageModel>, tools: Arc<ToolRegistry>) -> Self {
        let request = GenerationRequest::default();
        Self {
            llm,
            tools,
            system_prompt: None,
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            event_sink: None,
            session: AgentSession::new(),
            trace: Vec::new(),
        }
    }

    /// Creates an agent over the global tool registry.
    #[must_use]
    pub fn with_registered_tools(llm: Arc<dyn LanguageModel>) -> Self {
        Self::new(llm, get_tool_registry())
    }

    /// Creates an agent using the `agent` and `llm` sections of `config`.
    #[must_use]
    pub fn from_config(llm: Arc<dyn LanguageModel>, tools: Arc<ToolRegistry>, config: &RagConfig) -> Self {
        Self::new(llm, tools)
            .with_system_prompt(&config.agent.system_prompt)
            .with_max_tool_calls(config.agent.max_tool_calls)
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens)
    }

    /// Sets the system prompt. Blank prompts are not sent.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    /// Sets the maximum number of tool-call rounds per `ask`.
    #[must_use]
    pub fn with_max_tool_calls(mut self, limit: usize) -> Self {
        self.max_tool_calls = limit;
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the completion budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sends agent events to `sink` instead of the global sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Asks about images. The user turn carries `{"query", "image_urls"}` as
    /// JSON so the model can forward both to `multimodal_query`.
    pub async fn ask_with_images(&mut self, query: &str, image_urls: &[String]) -> Result<String, AgentError> {
        if image_urls.is_empty() {
            return self.ask(query).await;
        }
        let turn = json!({"query": query, "image_urls": image_urls}).to_string();
        self.ask(&turn).await
    }

    fn sink(&self) -> Arc<dyn EventSink> {
        self.event_sink.clone().unwrap_or_else(events::get_event_sink)
    }

    fn request(&self) -> GenerationRequest {
        GenerationRequest {
            messages: self.session.messages(self.system_prompt.as_deref()),
            tools: self.tools.list_schemas(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    async fn call_model(&mut self) -> Result<ModelReply, AgentError> {
        self.session.set_state(AgentState::AwaitingModel);
        let request = self.request();
        match self.llm.generate(&request).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.session.set_state(AgentState::Idle);
                Err(e.into())
            }
        }
    }

    async fn run_round(&mut self, round: usize, reply: ModelReply) -> Result<(), AgentError> {
        self.session.set_state(AgentState::ToolCallRequested);

        let unknown = reply
            .tool_calls
            .iter()
            .find(|c| !self.tools.contains(&c.name))
            .map(|c| c.name.clone());
        if let Some(name) = unknown {
            warn!(tool = %name, session = %self.session.id(), "Model requested an unregistered tool");
            self.session.hold_pending(reply.tool_calls);
            self.session.set_state(AgentState::Idle);
            return Err(UnknownToolError::new(name).into());
        }

        let sink = self.sink();
        let mut results = Vec::with_capacity(reply.tool_calls.len());
        for call in &reply.tool_calls {
            sink.emit(
                events::AGENT_TOOL_CALL,
                json!({
                    "session_id": self.session.id().to_string(),
                    "round": round,
                    "tool": call.name,
                    "call_id": call.id,
                }),
            )
            .await;
            debug!(tool = %call.name, round, "Running tool");

            let started = Instant::now();
            let output = match self.tools.invoke(&call.name, &call.arguments).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool failed, dropping the round");
                    self.session.hold_pending(reply.tool_calls.clone());
                    self.session.set_state(AgentState::Idle);
                    return Err(e.into());
                }
            };
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            results.push((call.id.clone(), render_output(&output)));
            self.trace.push(ToolCallRecord {
                round,
                call: call.clone(),
                output,
                duration_ms,
            });
        }

        // The request turn and its results land together or not at all.
        self.session.push_tool_request(reply.content, reply.tool_calls);
        for (call_id, content) in results {
            self.session.push_tool_result(&call_id, content);
        }
        Ok(())
    }
}

fn render_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Agent for ToolAgent {
    async fn ask(&mut self, query: &str) -> Result<String, AgentError> {
        self.trace.clear();
        self.session.push_user(query);
        info!(session = %self.session.id(), model = %self.llm.model_id(), "Agent received query");

        let mut rounds = 0;
        loop {
            let reply = self.call_model().await?;
            if !reply.wants_tools() {
                self.session.push_assistant(reply.content.clone());
                self.session.set_state(AgentState::ResponseReady);
                self.sink()
                    .emit(
                        events::AGENT_RESPONSE,
                        json!({
                            "session_id": self.session.id().to_string(),
                            "tool_rounds": rounds,
                            "tool_calls": self.trace.len(),
                        }),
                    )
                    .await;
                return Ok(reply.content);
            }

            if rounds == self.max_tool_calls {
                warn!(session = %self.session.id(), limit = self.max_tool_calls, "Tool-call limit reached");
                self.session.hold_pending(reply.tool_calls);
                self.session.set_state(AgentState::Idle);
                return Err(ToolLoopExceededError {
                    limit: self.max_tool_calls,
                }
                .into());
            }
            rounds += 1;
            self.run_round(rounds, reply).await?;
        }
    }

    fn session(&self) -> &AgentSession {
        &self.session
    }

    fn reset(&mut self) {
        self.session.reset();
        self.trace.clear();
    }

    fn trace(&self) -> &[ToolCallRecord] {
        &self.trace
    }
}
