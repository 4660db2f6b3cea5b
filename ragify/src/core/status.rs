//! Lifecycle state enums for pipelines, components and agents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of a pipeline instance.
///
/// `Created -> Configured -> Running -> (Completed | Failed)`. A completed or
/// failed pipeline may be run again; each run starts from its initial context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Components are still being assembled.
    #[default]
    Created,
    /// Components are validated and ordered.
    Configured,
    /// A run is in progress.
    Running,
    /// The last run completed.
    Completed,
    /// The last run failed.
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Configured => write!(f, "configured"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl PipelineState {
    /// Returns true if a run may start from this state.
    #[must_use]
    pub fn can_run(&self) -> bool {
        !matches!(self, Self::Created)
    }

    /// Returns true if the last run has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// The outcome of one component within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// The component finished and its outputs were merged.
    Completed,
    /// The component was disabled at configuration time.
    Skipped,
    /// The component failed and the run stopped.
    Failed,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The state of an agent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Waiting for a user query.
    #[default]
    Idle,
    /// A model call is outstanding.
    AwaitingModel,
    /// The model requested one or more tool calls.
    ToolCallRequested,
    /// A final response was produced.
    ResponseReady,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingModel => write!(f, "awaiting_model"),
            Self::ToolCallRequested => write!(f, "tool_call_requested"),
            Self::ResponseReady => write!(f, "response_ready"),
        }
    }
}
