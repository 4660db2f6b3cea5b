//! Named agent factories.
//!
//! The agent-side counterpart of [`ComponentRegistry`](crate::registry::ComponentRegistry):
//! a factory is registered under a type name and later asked to build an
//! agent from shared [`AgentResources`].

use super::{Agent, PipelineAgent, ToolAgent};
use crate::config::RagConfig;
use crate::errors::{ConfigValidationError, DuplicateRegistrationError, RagifyError, UnknownAgentError};
use crate::pipeline::Pipeline;
use crate::providers::LanguageModel;
use crate::tools::{multimodal_query_tool, ToolRegistry};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Registered type name of a [`ToolAgent`] over the supplied tools.
pub const TOOL_AGENT: &str = "tool_agent";
/// Registered type name of a [`PipelineAgent`] over the supplied query pipeline.
pub const PIPELINE_AGENT: &str = "pipeline_agent";
/// Registered type name of a [`ToolAgent`] that also carries `multimodal_query`.
pub const MULTIMODAL_RAG_AGENT: &str = "multimodal_rag_agent";

const MULTIMODAL_SYSTEM_PROMPT: &str = "You are a retrieval assistant that understands text and images. \
Use rag_query for text-only questions about the knowledge base. \
Use multimodal_query when the question refers to images, passing the query and its image_urls. \
Use vectorstore_info to describe the knowledge base. \
Answer directly when no tool is needed.";

/// What factories may draw on when building an agent.
#[derive(Clone, Default)]
pub struct AgentResources {
    /// Language model for tool-calling agents.
    pub llm: Option<Arc<dyn LanguageModel>>,
    /// Tools offered to tool-calling agents.
    pub tools: Option<Arc<ToolRegistry>>,
    /// Query pipeline for pipeline-backed and multimodal agents.
    pub query_pipeline: Option<Arc<Pipeline>>,
    /// Agent, model and retrieval settings.
    pub config: RagConfig,
}

impl fmt::Debug for AgentResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentResources")
            .field("llm", &self.llm.as_ref().map(|l| l.model_id().to_string()))
            .field("tools", &self.tools.as_ref().map(|t| t.names()))
            .field("query_pipeline", &self.query_pipeline.as_ref().map(|p| p.name().to_string()))
            .finish_non_exhaustive()
    }
}

impl AgentResources {
    /// Creates empty resources with `config`.
    #[must_use]
    pub fn new(config: RagConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the language model.
    #[must_use]
    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Sets the tools.
    #[must_use]
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Sets the query pipeline.
    #[must_use]
    pub fn with_query_pipeline(mut self, pipeline: Arc<Pipeline>) -> Self {
        self.query_pipeline = Some(pipeline);
        self
    }

    /// Returns the language model or a config error naming `agent`.
    pub fn require_llm(&self, agent: &str) -> Result<Arc<dyn LanguageModel>, ConfigValidationError> {
        self.llm.clone().ok_or_else(|| missing(agent, "llm"))
    }

    /// Returns the query pipeline or a config error naming `agent`.
    pub fn require_query_pipeline(&self, agent: &str) -> Result<Arc<Pipeline>, ConfigValidationError> {
        self.query_pipeline
            .clone()
            .ok_or_else(|| missing(agent, "query_pipeline"))
    }

    fn tools_or_empty(&self) -> Arc<ToolRegistry> {
        self.tools.clone().unwrap_or_default()
    }
}

fn missing(agent: &str, resource: &str) -> ConfigValidationError {
    ConfigValidationError::new(agent, resource, format!("no {resource} was provided to the agent registry"))
}

/// Builds an agent from shared resources.
pub type AgentFactory =
    Arc<dyn Fn(&AgentResources) -> Result<Box<dyn Agent>, ConfigValidationError> + Send + Sync>;

/// Maps agent type names to factories.
#[derive(Default)]
pub struct AgentRegistry {
    factories: RwLock<BTreeMap<String, AgentFactory>>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`.
    ///
    /// Fails if `name` is taken, unless `overwrite` is true.
    pub fn register(
        &self,
        name: impl Into<String>,
        factory: AgentFactory,
        overwrite: bool,
    ) -> Result<(), DuplicateRegistrationError> {
        let name = name.into();
        let mut factories = self.factories.write();
        if !overwrite && factories.contains_key(&name) {
            return Err(DuplicateRegistrationError::new("agent", name));
        }
        debug!(agent_type = %name, overwrite, "Registered agent type");
        factories.insert(name, factory);
        Ok(())
    }

    /// Builds an agent of type `name`.
    pub fn create(&self, name: &str, resources: &AgentResources) -> Result<Box<dyn Agent>, RagifyError> {
        let found = self.factories.read().get(name).cloned();
        let factory = found.ok_or_else(|| UnknownAgentError::new(name, self.list()))?;
        Ok(factory(resources)?)
    }

    /// Checks if a type is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Lists registered type names in sorted order.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    /// Removes every registration.
    pub fn clear(&self) {
        self.factories.write().clear();
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("types", &self.list())
            .finish()
    }
}

fn tool_agent_factory() -> AgentFactory {
    Arc::new(|res: &AgentResources| -> Result<Box<dyn Agent>, ConfigValidationError> {
        let llm = res.require_llm(TOOL_AGENT)?;
        Ok(Box::new(ToolAgent::from_config(llm, res.tools_or_empty(), &res.config)) as Box<dyn Agent>)
    })
}

fn pipeline_agent_factory() -> AgentFactory {
    Arc::new(|res: &AgentResources| -> Result<Box<dyn Agent>, ConfigValidationError> {
        let pipeline = res.require_query_pipeline(PIPELINE_AGENT)?;
        Ok(Box::new(PipelineAgent::new(pipeline).with_top_k(res.config.retrieval.k)) as Box<dyn Agent>)
    })
}

fn multimodal_agent_factory() -> AgentFactory {
    Arc::new(|res: &AgentResources| -> Result<Box<dyn Agent>, ConfigValidationError> {
        let llm = res.require_llm(MULTIMODAL_RAG_AGENT)?;
        let pipeline = res.require_query_pipeline(MULTIMODAL_RAG_AGENT)?;

        let tools = ToolRegistry::new();
        for tool in res.tools_or_empty().descriptors() {
            tools
                .register(tool)
                .map_err(|e| ConfigValidationError::new(MULTIMODAL_RAG_AGENT, "tools", e.to_string()))?;
        }
        tools
            .register_with(multimodal_query_tool(pipeline), true)
            .map_err(|e| ConfigValidationError::new(MULTIMODAL_RAG_AGENT, "tools", e.to_string()))?;

        let agent = ToolAgent::from_config(llm, Arc::new(tools), &res.config)
            .with_system_prompt(MULTIMODAL_SYSTEM_PROMPT);
        Ok(Box::new(agent) as Box<dyn Agent>)
    })
}

/// Registers `tool_agent`, `pipeline_agent` and `multimodal_rag_agent`.
pub fn register_builtin_agents(registry: &AgentRegistry) -> Result<(), DuplicateRegistrationError> {
    registry.register(TOOL_AGENT, tool_agent_factory(), false)?;
    registry.register(PIPELINE_AGENT, pipeline_agent_factory(), false)?;
    registry.register(MULTIMODAL_RAG_AGENT, multimodal_agent_factory(), false)?;
    Ok(())
}

/// Creates a fresh registry holding the built-in agent types.
pub fn builtin_agent_registry() -> Result<AgentRegistry, DuplicateRegistrationError> {
    let registry = AgentRegistry::new();
    register_builtin_agents(&registry)?;
    Ok(registry)
}

static GLOBAL_REGISTRY: RwLock<Option<Arc<AgentRegistry>>> = RwLock::new(None);

/// Gets the global agent registry, creating one with the built-in types if
/// needed.
pub fn get_agent_registry() -> Arc<AgentRegistry> {
    if let Some(registry) = GLOBAL_REGISTRY.read().as_ref() {
        return Arc::clone(registry);
    }
    let mut write = GLOBAL_REGISTRY.write();
    Arc::clone(write.get_or_insert_with(|| {
        let registry = AgentRegistry::new();
        // A fresh registry cannot hold duplicates.
        let _ = register_builtin_agents(&registry);
        Arc::new(registry)
    }))
}

/// Replaces the global agent registry.
pub fn set_agent_registry(registry: Arc<AgentRegistry>) {
    *GLOBAL_REGISTRY.write() = Some(registry);
}

/// Clears the global agent registry.
pub fn clear_agent_registry() {
    *GLOBAL_REGISTRY.write() = None;
}

/// Registers a factory in the global agent registry.
pub fn register_agent(name: impl Into<String>, factory: AgentFactory) -> Result<(), DuplicateRegistrationError> {
    get_agent_registry().register(name, factory, false)
}

/// Builds an agent through the global agent registry.
pub fn create_agent(name: &str, resources: &AgentResources) -> Result<Box<dyn Agent>, RagifyError> {
    get_agent_registry().create(name, resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ModelReply, ToolCallRequest};
    use crate::testing::{RecordingComponent, ScriptedLanguageModel};
    use crate::tools::default_tools;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn scripted(replies: Vec<ModelReply>) -> Arc<ScriptedLanguageModel> {
        Arc::new(ScriptedLanguageModel::new(replies))
    }

    fn answering_pipeline() -> Arc<Pipeline> {
        Arc::new(
            Pipeline::builder("answers")
                .component(Arc::new(RecordingComponent::new("answer").writing("response", "from the pipeline")))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_builtin_types_are_listed_sorted() {
        let registry = builtin_agent_registry().unwrap();
        assert_eq!(registry.list(), vec![MULTIMODAL_RAG_AGENT, PIPELINE_AGENT, TOOL_AGENT]);
    }

    #[tokio::test]
    async fn test_creates_tool_agent_from_resources() {
        let registry = builtin_agent_registry().unwrap();
        let llm = scripted(vec![
            ModelReply::tool_calls(vec![ToolCallRequest::new("c1", "calculate", json!({"expression": "2 * 21"}))]),
            ModelReply::text("42"),
        ]);
        let resources = AgentResources::new(RagConfig::default())
            .with_llm(llm.clone())
            .with_tools(Arc::new(ToolRegistry::with_tools(default_tools()).unwrap()));

        let mut agent = registry.create(TOOL_AGENT, &resources).unwrap();

        assert_eq!(agent.ask("What is 2 * 21?").await.unwrap(), "42");
        assert_eq!(agent.trace().len(), 1);
        assert_eq!(llm.requests()[0].messages[0].content, RagConfig::default().agent.system_prompt);
    }

    #[tokio::test]
    async fn test_creates_pipeline_agent() {
        let registry = builtin_agent_registry().unwrap();
        let resources = AgentResources::new(RagConfig::default()).with_query_pipeline(answering_pipeline());

        let mut agent = registry.create(PIPELINE_AGENT, &resources).unwrap();

        assert_eq!(agent.ask("anything").await.unwrap(), "from the pipeline");
        assert_eq!(agent.session().len(), 2);
    }

    #[test]
    fn test_missing_resource_is_config_error() {
        let registry = builtin_agent_registry().unwrap();
        let resources = AgentResources::new(RagConfig::default());

        match registry.create(MULTIMODAL_RAG_AGENT, &resources).err() {
            Some(RagifyError::ConfigValidation(e)) => assert!(e.mentions("llm")),
            other => panic!("unexpected result: {:?}", other.map(|e| e.to_string())),
        }
    }

    #[test]
    fn test_unknown_agent_lists_available() {
        let registry = builtin_agent_registry().unwrap();
        match registry.create("research_agent", &AgentResources::default()).err() {
            Some(RagifyError::UnknownAgent(e)) => {
                assert_eq!(e.name, "research_agent");
                assert_eq!(e.available.len(), 3);
            }
            other => panic!("unexpected result: {:?}", other.map(|e| e.to_string())),
        }
    }

    #[test]
    fn test_duplicates_need_overwrite() {
        let registry = builtin_agent_registry().unwrap();
        let err = registry.register(TOOL_AGENT, pipeline_agent_factory(), false).unwrap_err();
        assert_eq!(err.kind, "agent");

        registry.register(TOOL_AGENT, pipeline_agent_factory(), true).unwrap();
        let resources = AgentResources::new(RagConfig::default()).with_query_pipeline(answering_pipeline());
        assert!(registry.create(TOOL_AGENT, &resources).is_ok());
    }

    #[test]
    fn test_multimodal_agent_adds_its_tool() {
        let registry = builtin_agent_registry().unwrap();
        let shared = Arc::new(ToolRegistry::with_tools(default_tools()).unwrap());
        let resources = AgentResources::new(RagConfig::default())
            .with_llm(scripted(Vec::new()))
            .with_tools(shared.clone())
            .with_query_pipeline(answering_pipeline());

        assert!(registry.create(MULTIMODAL_RAG_AGENT, &resources).is_ok());
        assert!(!shared.contains("multimodal_query"));
    }

    #[tokio::test]
    async fn test_global_registry_starts_with_builtins() {
        let mut agent = {
            let _guard = crate::testing::global_state_lock();
            clear_agent_registry();
            register_agent(
                "echo_pipeline",
                Arc::new(|res: &AgentResources| -> Result<Box<dyn Agent>, ConfigValidationError> {
                    let pipeline = res.require_query_pipeline("echo_pipeline")?;
                    Ok(Box::new(PipelineAgent::new(pipeline)) as Box<dyn Agent>)
                }),
            )
            .unwrap();
            assert!(get_agent_registry().contains(TOOL_AGENT));

            let resources = AgentResources::default().with_query_pipeline(answering_pipeline());
            let agent = create_agent("echo_pipeline", &resources).unwrap();
            clear_agent_registry();
            agent
        };

        assert_eq!(agent.ask("hi").await.unwrap(), "from the pipeline");
    }
}
