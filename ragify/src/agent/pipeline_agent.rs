use super::{Agent, AgentSession, ToolCallRecord};
use crate::context::{RunContext, RunIdentity};
use crate::core::AgentState;
use crate::errors::AgentError;
use crate::pipeline::{Pipeline, RunReport};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Answers each query by running a query pipeline.
///
/// The pipeline receives `query` (and `k` when set) and must write
/// `response`. Runs carry the session ID in their identity.
#[derive(Debug)]
pub struct PipelineAgent {
    pipeline: Arc<Pipeline>,
    top_k: Option<usize>,
    session: AgentSession,
    last_report: Option<RunReport>,
}

impl PipelineAgent {
    /// Creates an agent over `pipeline`.
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            top_k: None,
            session: AgentSession::new(),
            last_report: None,
        }
    }

    /// Passes `k` to every run.
    #[must_use]
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Returns the report of the latest successful run.
    #[must_use]
    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }
}

#[async_trait]
impl Agent for PipelineAgent {
    async fn ask(&mut self, query: &str) -> Result<String, AgentError> {
        self.session.push_user(query);
        self.session.set_state(AgentState::AwaitingModel);

        let mut ctx = RunContext::new().with("query", query);
        if let Some(k) = self.top_k {
            ctx.insert("k", k);
        }
        let identity = RunIdentity::new(self.pipeline.name()).with_session_id(self.session.id());
        debug!(pipeline = %self.pipeline.name(), session = %self.session.id(), "Running query pipeline");

        let run = match self.pipeline.run_with_identity(identity, ctx).await {
            Ok(run) => run,
            Err(e) => {
                self.session.set_state(AgentState::Idle);
                return Err(e.into());
            }
        };
        self.last_report = Some(run.report);

        let Some(response) = run.context.text("response").map(str::to_string) else {
            self.session.set_state(AgentState::Idle);
            return Err(AgentError::NoResponse(self.pipeline.name().to_string()));
        };

        self.session.push_assistant(response.clone());
        self.session.set_state(AgentState::ResponseReady);
        info!(session = %self.session.id(), "Pipeline agent answered");
        Ok(response)
    }

    fn session(&self) -> &AgentSession {
        &self.session
    }

    fn reset(&mut self) {
        self.session.reset();
        self.last_report = None;
    }

    fn trace(&self) -> &[ToolCallRecord] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingComponent;
    use pretty_assertions::assert_eq;

    fn agent_with(component: RecordingComponent) -> PipelineAgent {
        let pipeline = Pipeline::builder("qa").component(Arc::new(component)).build().unwrap();
        PipelineAgent::new(Arc::new(pipeline))
    }

    #[tokio::test]
    async fn test_answers_from_response_key() {
        let mut agent = agent_with(RecordingComponent::new("answer").writing("response", "forty-two"));

        let answer = agent.ask("meaning of life?").await.unwrap();

        assert_eq!(answer, "forty-two");
        assert_eq!(agent.session().len(), 2);
        assert_eq!(agent.session().state(), AgentState::ResponseReady);
        assert_eq!(agent.last_report().unwrap().executed(), vec!["answer".to_string()]);
        assert!(agent.trace().is_empty());
    }

    #[tokio::test]
    async fn test_missing_response_is_an_error() {
        let mut agent = agent_with(RecordingComponent::new("silent").writing("other", "x"));

        let err = agent.ask("hello").await.unwrap_err();

        assert_eq!(err.to_string(), "pipeline 'qa' finished without a response");
        assert_eq!(agent.session().len(), 1);
        assert_eq!(agent.session().state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn test_query_and_k_reach_the_pipeline() {
        let recorder = Arc::new(RecordingComponent::new("answer").writing("response", "ok"));
        let pipeline = Pipeline::builder("qa").component(recorder.clone()).build().unwrap();
        let mut agent = PipelineAgent::new(Arc::new(pipeline)).with_top_k(2);

        agent.ask("first").await.unwrap();

        let seen = recorder.recorded_contexts();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].text("query"), Some("first"));
        assert_eq!(seen[0].integer("k"), Some(2));
    }
}
