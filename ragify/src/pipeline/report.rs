//! Per-run execution records.

use crate::context::{RunContext, RunIdentity};
use crate::core::ComponentStatus;
use serde::{Deserialize, Serialize};

/// What happened to one component during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Component instance name.
    pub component: String,
    /// Outcome.
    pub status: ComponentStatus,
    /// Wall time spent in `process`.
    pub duration_ms: f64,
    /// Keys added or replaced by the component.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys_written: Vec<String>,
    /// Failure message, for failed steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    pub(crate) fn skipped(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: ComponentStatus::Skipped,
            duration_ms: 0.0,
            keys_written: Vec::new(),
            error: None,
        }
    }
}

/// The ordered step records of one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// One record per configured component, in pipeline order.
    pub steps: Vec<StepRecord>,
    /// Total wall time.
    pub duration_ms: f64,
}

impl RunReport {
    /// Names of the components that completed, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.names_with(ComponentStatus::Completed)
    }

    /// Names of the components that were skipped.
    #[must_use]
    pub fn skipped(&self) -> Vec<String> {
        self.names_with(ComponentStatus::Skipped)
    }

    /// Returns the record for a component.
    #[must_use]
    pub fn step(&self, component: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.component == component)
    }

    fn names_with(&self, status: ComponentStatus) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.component.clone())
            .collect()
    }
}

/// A successful run: its identity, final context and report.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Who ran and when.
    pub identity: RunIdentity,
    /// The context after the last component.
    pub context: RunContext,
    /// Per-component records.
    pub report: RunReport,
}

impl PipelineRun {
    /// Consumes the run, returning the final context.
    #[must_use]
    pub fn into_context(self) -> RunContext {
        self.context
    }
}
