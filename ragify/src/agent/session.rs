//! Conversation state owned by one agent.

use crate::core::AgentState;
use crate::providers::{ChatMessage, Role, ToolCallRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// The message as sent to or received from the model.
    pub message: ChatMessage,
    /// When the turn was recorded.
    pub at: DateTime<Utc>,
}

impl Turn {
    fn now(message: ChatMessage) -> Self {
        Self { message, at: Utc::now() }
    }

    /// Returns the speaker.
    #[must_use]
    pub fn role(&self) -> Role {
        self.message.role
    }

    /// Returns the text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.message.content
    }
}

/// Ordered turns plus tool calls awaiting a result.
///
/// Turns are only appended. [`reset`](Self::reset) is the single way to
/// shorten the history, and it also starts a new session ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSession {
    id: Uuid,
    turns: Vec<Turn>,
    pending: Vec<ToolCallRequest>,
    state: AgentState,
}

impl Default for AgentSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentSession {
    /// Starts an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            turns: Vec::new(),
            pending: Vec::new(),
            state: AgentState::Idle,
        }
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the turns in order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the tool calls requested but not yet answered.
    #[must_use]
    pub fn pending(&self) -> &[ToolCallRequest] {
        &self.pending
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Returns the number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if nothing has been said.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns the last assistant text, if any.
    #[must_use]
    pub fn last_response(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role() == Role::Assistant && t.message.tool_calls.is_empty())
            .map(Turn::content)
    }

    /// Builds the model conversation: `system` first, then every turn.
    #[must_use]
    pub fn messages(&self, system: Option<&str>) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.extend(self.turns.iter().map(|t| t.message.clone()));
        messages
    }

    pub(crate) fn set_state(&mut self, state: AgentState) {
        self.state = state;
    }

    pub(crate) fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::now(ChatMessage::user(content)));
    }

    pub(crate) fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::now(ChatMessage::assistant(content)));
    }

    /// Records calls that could not be resolved. No turn is added.
    pub(crate) fn hold_pending(&mut self, calls: Vec<ToolCallRequest>) {
        self.pending = calls;
    }

    /// Records the assistant turn that requested `calls` and marks them
    /// pending.
    pub(crate) fn push_tool_request(&mut self, content: impl Into<String>, calls: Vec<ToolCallRequest>) {
        let mut message = ChatMessage::assistant(content);
        message.tool_calls.clone_from(&calls);
        self.turns.push(Turn::now(message));
        self.pending = calls;
    }

    /// Appends a tool result and clears the matching pending call.
    pub(crate) fn push_tool_result(&mut self, call_id: &str, content: impl Into<String>) {
        self.pending.retain(|c| c.id != call_id);
        self.turns.push(Turn::now(ChatMessage::tool(call_id, content)));
    }

    /// Drops all turns and pending calls and starts a new session ID.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
