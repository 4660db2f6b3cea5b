//! Run identity for tracking pipeline executions and agent sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this run.
    pub run_id: Uuid,

    /// The pipeline that executed.
    pub pipeline: String,

    /// The agent session that triggered the run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,

    /// When the run started.
    pub started_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates a new identity with a time-ordered run ID.
    #[must_use]
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            pipeline: pipeline.into(),
            session_id: None,
            started_at: Utc::now(),
        }
    }

    /// Sets the session ID.
    #[must_use]
    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Converts to a JSON map suitable for event payloads.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "run_id": self.run_id.to_string(),
            "pipeline": self.pipeline,
            "started_at": self.started_at.to_rfc3339(),
        });
        if let (Some(session), Some(map)) = (self.session_id, value.as_object_mut()) {
            map.insert("session_id".to_string(), serde_json::json!(session.to_string()));
        }
        value
    }
}
