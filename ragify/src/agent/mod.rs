//! Conversational agents over a language model or a query pipeline.
//!
//! - [`ToolAgent`] runs a bounded tool-calling loop against a [`ToolRegistry`](crate::tools::ToolRegistry).
//! - [`PipelineAgent`] answers each query by running a pipeline.
//! - [`AgentRegistry`] builds either kind by type name from shared
//!   [`AgentResources`].
//!
//! Both agent kinds keep an [`AgentSession`] whose history only grows until
//! [`Agent::reset`] is called.

mod pipeline_agent;
mod registry;
mod session;
mod tool_agent;

pub use pipeline_agent::PipelineAgent;
pub use registry::{
    builtin_agent_registry, clear_agent_registry, create_agent, get_agent_registry, register_agent,
    register_builtin_agents, set_agent_registry, AgentFactory, AgentRegistry, AgentResources,
    MULTIMODAL_RAG_AGENT, PIPELINE_AGENT, TOOL_AGENT,
};
pub use session::{AgentSession, Turn};
pub use tool_agent::{ToolAgent, DEFAULT_MAX_TOOL_CALLS};

use crate::errors::AgentError;
use crate::providers::ToolCallRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// The tool-call round, starting at 1.
    pub round: usize,
    /// The call as the model requested it.
    pub call: ToolCallRequest,
    /// What the tool returned.
    pub output: Value,
    /// Wall time in milliseconds.
    pub duration_ms: f64,
}

/// A stateful conversational agent.
#[async_trait]
pub trait Agent: Send {
    /// Answers `query`, recording the exchange in the session.
    async fn ask(&mut self, query: &str) -> Result<String, AgentError>;

    /// The conversation so far.
    fn session(&self) -> &AgentSession;

    /// Clears the history and starts a new session.
    fn reset(&mut self);

    /// Tool calls made by the latest `ask`.
    fn trace(&self) -> &[ToolCallRecord];
}
