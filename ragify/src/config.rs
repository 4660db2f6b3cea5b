//! Typed application configuration.
//!
//! A [`RagConfig`] is read from TOML (or JSON). Every field has a default,
//! so an empty document is a working offline configuration: hashing
//! embeddings, the extractive language model and an in-memory store.

use crate::components::ComponentPorts;
use crate::errors::{ConfigError, ConfigValidationError, ConfigViolation, RagifyError};
use crate::pipeline::{PipelineKind, PipelineSpec};
use crate::providers::{EmbeddingModel, ExtractiveLanguageModel, HashingEmbedder, LanguageModel};
use crate::ranking::SimilarityMetric;
use crate::store::{InMemoryVectorStore, VectorStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

fn default_llm_provider() -> String {
    "extractive".to_string()
}
fn default_llm_model() -> String {
    "extractive".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_embedding_provider() -> String {
    "hashing".to_string()
}
fn default_embedding_model() -> String {
    "hashing".to_string()
}
fn default_dimensions() -> usize {
    384
}
fn default_store_type() -> String {
    "in_memory".to_string()
}
fn default_collection() -> String {
    "ragify".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_image_size() -> u64 {
    5 * 1024 * 1024
}
fn default_k() -> usize {
    4
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_min_chunk_length() -> usize {
    20
}
fn default_max_tool_calls() -> usize {
    5
}
fn default_agent_prompt() -> String {
    "You are a helpful assistant. Use the available tools when they help answer the question."
        .to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Language model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// `extractive` or `openai`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    /// Model name passed to the provider.
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Completion token limit.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Endpoint override for OpenAI-compatible servers.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key_env: None,
            base_url: None,
        }
    }
}

/// Embedding model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// `hashing` or `openai`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Model name passed to the provider.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Vector size for providers that let it be chosen.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Endpoint override for OpenAI-compatible servers.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            api_key_env: None,
            base_url: None,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Store implementation. Only `in_memory` is bundled.
    #[serde(rename = "type", default = "default_store_type")]
    pub store_type: String,
    /// Directory for the persisted collection. `None` keeps it in memory.
    #[serde(default)]
    pub persist_directory: Option<String>,
    /// Collection name.
    #[serde(default = "default_collection")]
    pub collection_name: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            store_type: default_store_type(),
            persist_directory: None,
            collection_name: default_collection(),
        }
    }
}

/// Image handling within multimodal loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageProcessingConfig {
    /// Embed image bytes in document metadata.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Largest image, in bytes, that is embedded.
    #[serde(default = "default_max_image_size")]
    pub max_size: u64,
}

impl Default for ImageProcessingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: default_max_image_size(),
        }
    }
}

/// Multimodal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultimodalConfig {
    /// Load images alongside text.
    #[serde(default)]
    pub enabled: bool,
    /// Read OCR sidecar files.
    #[serde(default = "default_true")]
    pub ocr_enabled: bool,
    /// Image byte handling.
    #[serde(default)]
    pub image_processing: ImageProcessingConfig,
}

impl Default for MultimodalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ocr_enabled: true,
            image_processing: ImageProcessingConfig::default(),
        }
    }
}

/// Splitting and retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks returned per query.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Results scoring below this are dropped.
    #[serde(default)]
    pub score_threshold: Option<f32>,
    /// Splitter chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Splitter overlap in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Shortest chunk kept.
    #[serde(default = "default_min_chunk_length")]
    pub min_chunk_length: usize,
    /// Similarity metric.
    #[serde(default)]
    pub metric: SimilarityMetric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            score_threshold: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_length: default_min_chunk_length(),
            metric: SimilarityMetric::Cosine,
        }
    }
}

/// Agent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool-call rounds allowed per question.
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: usize,
    /// System prompt for tool agents.
    #[serde(default = "default_agent_prompt")]
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_calls: default_max_tool_calls(),
            system_prompt: default_agent_prompt(),
        }
    }
}

/// Logging settings consumed by [`init_tracing`](crate::observability::init_tracing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Language model.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Embedding model.
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    /// Vector store.
    #[serde(default)]
    pub vectorstore: VectorStoreConfig,
    /// Multimodal loading.
    #[serde(default)]
    pub multimodal: MultimodalConfig,
    /// Splitting and retrieval.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Agents.
    #[serde(default)]
    pub agent: AgentConfig,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RagConfig {
    /// Reads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RagifyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, RagifyError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(input: &str) -> Result<Self, RagifyError> {
        let config: Self =
            serde_json::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let mut violations = Vec::new();
        let mut reject = |option: &str, reason: String| {
            violations.push(ConfigViolation {
                option: option.to_string(),
                reason,
            });
        };

        if self.retrieval.k == 0 {
            reject("retrieval.k", "must be at least 1".to_string());
        }
        if self.retrieval.chunk_size == 0 {
            reject("retrieval.chunk_size", "must be at least 1".to_string());
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            reject(
                "retrieval.chunk_overlap",
                format!(
                    "{} must be smaller than chunk_size {}",
                    self.retrieval.chunk_overlap, self.retrieval.chunk_size
                ),
            );
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            reject("llm.temperature", format!("{} is outside 0..=2", self.llm.temperature));
        }
        if self.embeddings.dimensions == 0 {
            reject("embeddings.dimensions", "must be at least 1".to_string());
        }
        if self.agent.max_tool_calls == 0 {
            reject("agent.max_tool_calls", "must be at least 1".to_string());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigValidationError::from_violations("config", violations))
        }
    }

    /// Returns the API key named by `api_key_env`, if one is configured.
    ///
    /// Fails only when a variable is named but not set.
    pub fn resolve_api_key(api_key_env: Option<&str>) -> Result<Option<String>, ConfigError> {
        match api_key_env {
            None => Ok(None),
            Some(var) => std::env::var(var)
                .map(Some)
                .map_err(|_| ConfigError::MissingEnv(var.to_string())),
        }
    }

    /// Builds the embedding model named by `embeddings.provider`.
    pub fn build_embedder(&self) -> Result<Arc<dyn EmbeddingModel>, RagifyError> {
        match self.embeddings.provider.as_str() {
            "hashing" => Ok(Arc::new(HashingEmbedder::new(self.embeddings.dimensions))),
            #[cfg(feature = "http")]
            "openai" => {
                let key = Self::resolve_api_key(self.embeddings.api_key_env.as_deref())?;
                let client = self.openai_client(key, self.embeddings.base_url.as_deref(), None)?;
                Ok(Arc::new(client))
            }
            other => Err(unknown_provider("embeddings", other)),
        }
    }

    /// Builds the language model named by `llm.provider`.
    pub fn build_llm(&self) -> Result<Arc<dyn LanguageModel>, RagifyError> {
        match self.llm.provider.as_str() {
            "extractive" => Ok(Arc::new(ExtractiveLanguageModel::new())),
            #[cfg(feature = "http")]
            "openai" => {
                let key = Self::resolve_api_key(self.llm.api_key_env.as_deref())?;
                let client =
                    self.openai_client(key, self.llm.base_url.as_deref(), Some(&self.llm.model))?;
                Ok(Arc::new(client))
            }
            other => Err(unknown_provider("llm", other)),
        }
    }

    /// Opens the vector store named by `vectorstore.type`.
    pub fn build_store(&self) -> Result<Arc<dyn VectorStore>, RagifyError> {
        match self.vectorstore.store_type.as_str() {
            "in_memory" | "memory" => {
                let collection = self.vectorstore.collection_name.clone();
                let store = match &self.vectorstore.persist_directory {
                    Some(dir) => InMemoryVectorStore::open(dir, collection)?,
                    None => InMemoryVectorStore::new(collection),
                };
                Ok(Arc::new(store))
            }
            other => Err(unknown_provider("vectorstore", other)),
        }
    }

    /// Builds all capabilities the built-in components need.
    pub fn build_ports(&self) -> Result<ComponentPorts, RagifyError> {
        let ports = ComponentPorts::new()
            .with_embedder(self.build_embedder()?)
            .with_llm(self.build_llm()?)
            .with_store(self.build_store()?);
        debug!(ports = ?ports, "Built component ports");
        Ok(ports)
    }

    #[cfg(feature = "http")]
    fn openai_client(
        &self,
        api_key: Option<String>,
        base_url: Option<&str>,
        chat_model: Option<&str>,
    ) -> Result<crate::providers::OpenAiCompatibleClient, RagifyError> {
        let mut config = crate::providers::OpenAiConfig::default()
            .with_embedding_model(&self.embeddings.model);
        if let Some(model) = chat_model {
            config = config.with_chat_model(model);
        }
        if let Some(url) = base_url {
            config = config.with_base_url(url);
        }
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }
        Ok(crate::providers::OpenAiCompatibleClient::new(config)?)
    }

    /// The indexing pipeline spec, text-only or multimodal.
    #[must_use]
    pub fn indexing_spec(&self, multimodal: bool) -> PipelineSpec {
        let kind = if multimodal {
            PipelineKind::MultimodalIndexing
        } else {
            PipelineKind::Indexing
        };
        kind.spec(self)
    }

    /// The query pipeline spec, text-only or multimodal.
    #[must_use]
    pub fn query_spec(&self, multimodal: bool) -> PipelineSpec {
        let kind = if multimodal {
            PipelineKind::MultimodalQuery
        } else {
            PipelineKind::Query
        };
        kind.spec(self)
    }
}

fn unknown_provider(capability: &str, provider: &str) -> RagifyError {
    ConfigError::UnknownProvider {
        capability: capability.to_string(),
        provider: provider.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RagConfig::from_toml_str("").unwrap();
        assert_eq!(config, RagConfig::default());
        assert_eq!(config.retrieval.k, 4);
        assert_eq!(config.vectorstore.store_type, "in_memory");
    }

    #[test]
    fn test_parses_sections() {
        let config = RagConfig::from_toml_str(
            r#"
[llm]
provider = "extractive"
temperature = 0.2

[embeddings]
dimensions = 64

[vectorstore]
type = "in_memory"
collection_name = "notes"

[multimodal]
enabled = true

[multimodal.image_processing]
max_size = 1024

[retrieval]
k = 2
metric = "inner_product"
"#,
        )
        .unwrap();

        assert!((config.llm.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.embeddings.dimensions, 64);
        assert_eq!(config.vectorstore.collection_name, "notes");
        assert!(config.multimodal.enabled);
        assert!(config.multimodal.ocr_enabled);
        assert_eq!(config.multimodal.image_processing.max_size, 1024);
        assert_eq!(config.retrieval.metric, SimilarityMetric::InnerProduct);
    }

    #[test]
    fn test_validation_collects_everything() {
        let err = RagConfig::from_json_str(
            r#"{"retrieval": {"k": 0, "chunk_size": 10, "chunk_overlap": 10}, "agent": {"max_tool_calls": 0}}"#,
        )
        .unwrap_err();

        match err {
            RagifyError::ConfigValidation(e) => {
                assert!(e.mentions("retrieval.k"));
                assert!(e.mentions("retrieval.chunk_overlap"));
                assert!(e.mentions("agent.max_tool_calls"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_error() {
        let err = RagConfig::from_toml_str("[llm\nprovider=").unwrap_err();
        assert!(matches!(err, RagifyError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_env_is_reported() {
        let err = RagConfig::resolve_api_key(Some("RAGIFY_TEST_SURELY_UNSET_KEY")).unwrap_err();
        assert_eq!(err, ConfigError::MissingEnv("RAGIFY_TEST_SURELY_UNSET_KEY".to_string()));
        assert_eq!(RagConfig::resolve_api_key(None).unwrap(), None);
    }

    #[test]
    fn test_unknown_provider() {
        let mut config = RagConfig::default();
        config.llm.provider = "carrier-pigeon".to_string();
        let err = config.build_llm().err().unwrap();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[tokio::test]
    async fn test_build_ports_offline() {
        let config = RagConfig::default();
        let ports = config.build_ports().unwrap();
        assert_eq!(ports.embedder.as_ref().unwrap().model_id(), "hashing-384");
        assert_eq!(ports.store.as_ref().unwrap().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persistent_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.vectorstore.persist_directory = Some(dir.path().display().to_string());
        let store = config.build_store().unwrap();
        assert_eq!(store.info().await.unwrap().collection, "ragify");
    }
}
