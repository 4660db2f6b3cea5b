//! Indexing followed by querying, driven as one unit.

use super::{create_pipeline, IndexingSummary, Pipeline, PipelineKind, PipelineRun, QuerySummary};
use crate::config::RagConfig;
use crate::context::{RunContext, RunIdentity};
use crate::errors::{PipelineError, RagifyError};
use crate::registry::ComponentRegistry;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// An indexing pipeline paired with the query pipeline that reads its store.
#[derive(Debug, Clone)]
pub struct RagWorkflow {
    indexing: Arc<Pipeline>,
    query: Arc<Pipeline>,
}

/// Both runs of [`RagWorkflow::run_complete`].
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    /// Shared by both runs as their session ID.
    pub workflow_id: Uuid,
    /// The indexing run.
    pub indexing: PipelineRun,
    /// The query run.
    pub query: PipelineRun,
}

impl WorkflowRun {
    /// Summarizes the indexing run.
    #[must_use]
    pub fn indexing_summary(&self) -> IndexingSummary {
        IndexingSummary::from_context(&self.indexing.context)
    }

    /// Summarizes the query run.
    #[must_use]
    pub fn query_summary(&self) -> QuerySummary {
        QuerySummary::from_context(&self.query.context)
    }

    /// Returns the generated answer, if the query run wrote one.
    #[must_use]
    pub fn response(&self) -> Option<&str> {
        self.query.context.text("response")
    }

    /// Renders both final contexts as `{indexing_result, query_result}`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "workflow_id": self.workflow_id.to_string(),
            "indexing_result": self.indexing.context.to_json(),
            "query_result": self.query.context.to_json(),
        })
    }
}

impl RagWorkflow {
    /// Pairs two built pipelines.
    #[must_use]
    pub fn new(indexing: Arc<Pipeline>, query: Arc<Pipeline>) -> Self {
        Self { indexing, query }
    }

    /// Builds the predefined indexing and query variants from `config`.
    pub fn from_config(
        config: &RagConfig,
        registry: &ComponentRegistry,
        multimodal: bool,
    ) -> Result<Self, RagifyError> {
        let (indexing, query) = if multimodal {
            (PipelineKind::MultimodalIndexing, PipelineKind::MultimodalQuery)
        } else {
            (PipelineKind::Indexing, PipelineKind::Query)
        };
        Ok(Self::new(
            Arc::new(create_pipeline(indexing, config, registry)?),
            Arc::new(create_pipeline(query, config, registry)?),
        ))
    }

    /// Returns the indexing pipeline.
    #[must_use]
    pub fn indexing(&self) -> &Arc<Pipeline> {
        &self.indexing
    }

    /// Returns the query pipeline.
    #[must_use]
    pub fn query(&self) -> &Arc<Pipeline> {
        &self.query
    }

    /// Runs the indexing pipeline alone.
    pub async fn run_indexing(&self, input: RunContext) -> Result<PipelineRun, PipelineError> {
        self.indexing.run(input).await
    }

    /// Runs the query pipeline alone.
    pub async fn run_query(&self, input: RunContext) -> Result<PipelineRun, PipelineError> {
        self.query.run(input).await
    }

    /// Indexes `index_input`, then answers `query_input`.
    ///
    /// The query only runs after indexing succeeded.
    pub async fn run_complete(
        &self,
        index_input: RunContext,
        query_input: RunContext,
    ) -> Result<WorkflowRun, PipelineError> {
        let workflow_id = Uuid::now_v7();
        info!(workflow = %workflow_id, indexing = %self.indexing.name(), query = %self.query.name(), "Workflow started");

        let identity = RunIdentity::new(self.indexing.name()).with_session_id(workflow_id);
        let indexing = self.indexing.run_with_identity(identity, index_input).await?;

        let identity = RunIdentity::new(self.query.name()).with_session_id(workflow_id);
        let query = self.query.run_with_identity(identity, query_input).await?;

        info!(workflow = %workflow_id, "Workflow completed");
        Ok(WorkflowRun {
            workflow_id,
            indexing,
            query,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::builtin_registry;
    use crate::testing::{test_ports, write_text_fixtures, FailingComponent};
    use pretty_assertions::assert_eq;

    fn workflow() -> RagWorkflow {
        let registry = builtin_registry(&test_ports()).unwrap();
        RagWorkflow::from_config(&RagConfig::default(), &registry, false).unwrap()
    }

    #[tokio::test]
    async fn test_complete_workflow_indexes_then_answers() {
        let dir = tempfile::tempdir().unwrap();
        write_text_fixtures(
            dir.path(),
            &[
                ("mars.txt", "Mars is called the red planet. Iron oxide dust covers its surface."),
                ("venus.txt", "Venus has a thick atmosphere of carbon dioxide."),
            ],
        )
        .unwrap();

        let run = workflow()
            .run_complete(
                RunContext::new().with("directory_path", dir.path().display().to_string()),
                RunContext::new().with("query", "Which planet is red?").with("k", 1_usize),
            )
            .await
            .unwrap();

        assert_eq!(run.indexing_summary().chunks_indexed, 2);
        assert_eq!(run.query_summary().retrieved, 1);
        assert!(run.response().unwrap().contains("red planet"));
        assert_eq!(run.indexing.identity.session_id, Some(run.workflow_id));
        assert_eq!(run.query.identity.session_id, Some(run.workflow_id));

        let rendered = run.to_json();
        assert_eq!(rendered["indexing_result"]["chunks_indexed"], json!(2));
        assert!(rendered["query_result"]["response"].is_string());
    }

    #[tokio::test]
    async fn test_failed_indexing_skips_the_query() {
        let failing = Pipeline::builder("broken_indexing")
            .component(Arc::new(FailingComponent::new("loader", "disk on fire")))
            .build()
            .unwrap();
        let query = workflow().query().clone();
        let workflow = RagWorkflow::new(Arc::new(failing), query.clone());

        let err = workflow
            .run_complete(RunContext::new(), RunContext::new().with("query", "anything"))
            .await
            .unwrap_err();

        assert_eq!(err.failed_component(), "loader");
        assert_eq!(query.state(), crate::core::PipelineState::Configured);
    }
}
