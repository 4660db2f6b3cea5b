//! Pipeline components.
//!
//! A component reads a declared set of context keys, does one unit of work
//! and writes a declared set of keys back. Components are independent
//! values: they never call each other and only meet through the context.

mod embedder;
mod generator;
mod loader;
mod retriever;
mod splitter;
mod store_writer;

pub use embedder::{ChunkEmbedder, QueryEmbedder};
pub use generator::{GeneratorOptions, ResponseGenerator};
pub use loader::{DocumentLoader, LoaderOptions};
pub use retriever::{Retriever, RetrieverOptions};
pub use splitter::{SplitterOptions, TextSplitter};
pub use store_writer::VectorStoreWriter;

use crate::context::RunContext;
use crate::errors::{ComponentError, ConfigValidationError, DuplicateRegistrationError};
use crate::providers::{EmbeddingModel, LanguageModel};
use crate::ranking::SimilarityMetric;
use crate::registry::{get_component_registry, ComponentRegistry};
use crate::store::VectorStore;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::info;

/// Registered type name of [`DocumentLoader`].
pub const DOCUMENT_LOADER: &str = "document_loader";
/// Registered type name of [`TextSplitter`].
pub const TEXT_SPLITTER: &str = "text_splitter";
/// Registered type name of [`ChunkEmbedder`].
pub const CHUNK_EMBEDDER: &str = "chunk_embedder";
/// Registered type name of [`VectorStoreWriter`].
pub const VECTOR_STORE_WRITER: &str = "vector_store_writer";
/// Registered type name of [`QueryEmbedder`].
pub const QUERY_EMBEDDER: &str = "query_embedder";
/// Registered type name of [`Retriever`].
pub const RETRIEVER: &str = "retriever";
/// Registered type name of [`ResponseGenerator`].
pub const RESPONSE_GENERATOR: &str = "response_generator";

/// A unit of work inside a pipeline.
#[async_trait]
pub trait PipelineComponent: Send + Sync + Debug {
    /// Returns the instance name.
    fn name(&self) -> &str;

    /// Keys that must be present before [`process`](Self::process) runs.
    fn required_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Keys this component writes. Only these may be removed or replaced.
    fn provided_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the component takes part in runs. Decided at configuration.
    fn is_enabled(&self) -> bool {
        true
    }

    /// The similarity metric this component scores with, if any.
    fn similarity_metric(&self) -> Option<SimilarityMetric> {
        None
    }

    /// Reads from and writes to the context.
    async fn process(&self, ctx: &mut RunContext) -> Result<(), ComponentError>;
}

/// Capabilities injected into built-in components.
#[derive(Clone, Default)]
pub struct ComponentPorts {
    /// Embedding model for chunk and query embedders.
    pub embedder: Option<Arc<dyn EmbeddingModel>>,
    /// Language model for the response generator.
    pub llm: Option<Arc<dyn LanguageModel>>,
    /// Vector store for the writer and retriever.
    pub store: Option<Arc<dyn VectorStore>>,
}

impl Debug for ComponentPorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentPorts")
            .field("embedder", &self.embedder.as_ref().map(|e| e.model_id().to_string()))
            .field("llm", &self.llm.as_ref().map(|l| l.model_id().to_string()))
            .field("has_store", &self.store.is_some())
            .finish()
    }
}

impl ComponentPorts {
    /// Creates empty ports.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the embedding model.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingModel>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Sets the language model.
    #[must_use]
    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Sets the vector store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub(crate) fn require_embedder(
        &self,
        component: &str,
    ) -> Result<Arc<dyn EmbeddingModel>, ConfigValidationError> {
        self.embedder
            .clone()
            .ok_or_else(|| missing_port(component, "embedder"))
    }

    pub(crate) fn require_llm(
        &self,
        component: &str,
    ) -> Result<Arc<dyn LanguageModel>, ConfigValidationError> {
        self.llm.clone().ok_or_else(|| missing_port(component, "llm"))
    }

    pub(crate) fn require_store(
        &self,
        component: &str,
    ) -> Result<Arc<dyn VectorStore>, ConfigValidationError> {
        self.store.clone().ok_or_else(|| missing_port(component, "store"))
    }
}

fn missing_port(component: &str, port: &str) -> ConfigValidationError {
    ConfigValidationError::new(component, port, format!("no {port} was provided to the registry"))
}

/// Registers every built-in component type, capturing `ports` in the
/// factories.
pub fn register_builtin_components(
    registry: &ComponentRegistry,
    ports: &ComponentPorts,
) -> Result<(), DuplicateRegistrationError> {
    register_builtins(registry, ports, false)
}

fn register_builtins(
    registry: &ComponentRegistry,
    ports: &ComponentPorts,
    overwrite: bool,
) -> Result<(), DuplicateRegistrationError> {
    registry.register(DOCUMENT_LOADER, loader::factory(), loader::schema(), overwrite)?;
    registry.register(TEXT_SPLITTER, splitter::factory(), splitter::schema(), overwrite)?;
    registry.register(
        CHUNK_EMBEDDER,
        embedder::chunk_factory(ports.clone()),
        embedder::chunk_schema(),
        overwrite,
    )?;
    registry.register(
        QUERY_EMBEDDER,
        embedder::query_factory(ports.clone()),
        embedder::query_schema(),
        overwrite,
    )?;
    registry.register(
        VECTOR_STORE_WRITER,
        store_writer::factory(ports.clone()),
        store_writer::schema(),
        overwrite,
    )?;
    registry.register(
        RETRIEVER,
        retriever::factory(ports.clone()),
        retriever::schema(),
        overwrite,
    )?;
    registry.register(
        RESPONSE_GENERATOR,
        generator::factory(ports.clone()),
        generator::schema(),
        overwrite,
    )?;
    Ok(())
}

/// Seeds the global component registry with the built-in types bound to
/// `ports`.
///
/// Built-in entries already present are replaced, so calling `init` again
/// rebinds them to new ports. Custom types registered globally are kept.
pub fn init(ports: &ComponentPorts) -> Result<Arc<ComponentRegistry>, DuplicateRegistrationError> {
    let registry = get_component_registry();
    register_builtins(&registry, ports, true)?;
    info!(types = registry.list().len(), "Global component registry initialized");
    Ok(registry)
}

/// Creates a fresh registry holding the built-in component types.
pub fn builtin_registry(ports: &ComponentPorts) -> Result<ComponentRegistry, DuplicateRegistrationError> {
    let registry = ComponentRegistry::new();
    register_builtin_components(&registry, ports)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextValue;
    use crate::core::{Chunk, Document, EmbeddedChunk, Metadata};
    use crate::errors::RagifyError;
    use crate::testing::test_ports;
    use serde_json::{json, Map};

    async fn sample_value(key: &str, embedder: &dyn EmbeddingModel) -> ContextValue {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), json!("notes.txt"));
        let doc = Document::new("Saturn has rings of ice and rock.", metadata);
        let embedding = embedder.embed(doc.content()).await.unwrap();
        match key {
            "documents" => vec![doc].into(),
            "chunks" => vec![Chunk::whole(&doc)].into(),
            "embedded_chunks" => vec![EmbeddedChunk {
                chunk: Chunk::whole(&doc),
                embedding,
            }]
            .into(),
            "query_embedding" => embedding.into(),
            "query" => "What are Saturn's rings made of?".into(),
            other => panic!("no sample value for required key '{other}'"),
        }
    }

    #[tokio::test]
    async fn test_declared_required_keys_are_sufficient() {
        let ports = test_ports();
        let embedder = ports.embedder.clone().unwrap();
        let registry = builtin_registry(&ports).unwrap();

        for type_name in registry.list() {
            let component = registry.create(&type_name, &Map::new()).unwrap();
            let mut ctx = RunContext::new();
            for key in component.required_keys() {
                ctx.insert(key.clone(), sample_value(&key, embedder.as_ref()).await);
            }

            if let Err(e) = component.process(&mut ctx).await {
                assert!(!e.is_missing_key(), "{type_name} failed with a missing key: {e}");
            }
        }
    }

    #[test]
    fn test_builtin_registry_lists_all_types() {
        let registry = builtin_registry(&test_ports()).unwrap();
        let names: Vec<_> = registry.list().into_iter().collect();
        assert_eq!(
            names,
            vec![
                CHUNK_EMBEDDER,
                DOCUMENT_LOADER,
                QUERY_EMBEDDER,
                RESPONSE_GENERATOR,
                RETRIEVER,
                TEXT_SPLITTER,
                VECTOR_STORE_WRITER,
            ]
        );
    }

    #[test]
    fn test_registering_twice_fails() {
        let registry = builtin_registry(&test_ports()).unwrap();
        assert!(register_builtin_components(&registry, &test_ports()).is_err());
    }

    #[test]
    fn test_missing_port_is_config_error() {
        let registry = builtin_registry(&ComponentPorts::new()).unwrap();
        let err = registry.create(RETRIEVER, &Map::new()).unwrap_err();
        match err {
            RagifyError::ConfigValidation(e) => assert!(e.mentions("embedder") || e.mentions("store")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ports_debug_hides_internals() {
        let rendered = format!("{:?}", test_ports());
        assert!(rendered.contains("has_store: true"));
    }
}
