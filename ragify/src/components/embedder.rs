//! Components that turn chunks and queries into embeddings.

use super::{ComponentPorts, PipelineComponent};
use crate::context::RunContext;
use crate::core::EmbeddedChunk;
use crate::errors::ComponentError;
use crate::providers::EmbeddingModel;
use crate::registry::{ComponentFactory, ConfigSchema, OptionSpec, ResolvedConfig};
use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_BATCH_SIZE: usize = 32;

pub(crate) fn chunk_schema() -> ConfigSchema {
    ConfigSchema::new().option(
        OptionSpec::integer("batch_size")
            .default_value(json!(DEFAULT_BATCH_SIZE))
            .min(1.0)
            .describe("Number of chunks sent to the model per call"),
    )
}

pub(crate) fn chunk_factory(ports: ComponentPorts) -> ComponentFactory {
    Arc::new(move |cfg: &ResolvedConfig| {
        let model = ports.require_embedder(&cfg.instance_name)?;
        let batch_size = cfg
            .values
            .get("batch_size")
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(DEFAULT_BATCH_SIZE);
        Ok(Arc::new(
            ChunkEmbedder::new(&cfg.instance_name, model)
                .with_batch_size(batch_size)
                .enabled(cfg.enabled()),
        ) as Arc<dyn PipelineComponent>)
    })
}

pub(crate) fn query_schema() -> ConfigSchema {
    ConfigSchema::new()
}

pub(crate) fn query_factory(ports: ComponentPorts) -> ComponentFactory {
    Arc::new(move |cfg: &ResolvedConfig| {
        let model = ports.require_embedder(&cfg.instance_name)?;
        Ok(Arc::new(QueryEmbedder::new(&cfg.instance_name, model).enabled(cfg.enabled()))
            as Arc<dyn PipelineComponent>)
    })
}

/// Reads `chunks`, writes `embedded_chunks`.
pub struct ChunkEmbedder {
    name: String,
    model: Arc<dyn EmbeddingModel>,
    batch_size: usize,
    enabled: bool,
}

impl fmt::Debug for ChunkEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkEmbedder")
            .field("name", &self.name)
            .field("model", &self.model.model_id())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl ChunkEmbedder {
    /// Creates a chunk embedder.
    #[must_use]
    pub fn new(name: impl Into<String>, model: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            name: name.into(),
            model,
            batch_size: DEFAULT_BATCH_SIZE,
            enabled: true,
        }
    }

    /// Sets the batch size (at least 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Sets whether the embedder is enabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl PipelineComponent for ChunkEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_keys(&self) -> Vec<String> {
        vec!["chunks".to_string()]
    }

    fn provided_keys(&self) -> Vec<String> {
        vec!["embedded_chunks".to_string()]
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn process(&self, ctx: &mut RunContext) -> Result<(), ComponentError> {
        let chunks = ctx.require_chunks(&self.name, "chunks")?;

        let mut embedded = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content().to_string()).collect();
            let vectors = self
                .model
                .embed_batch(&texts)
                .await
                .map_err(|e| ComponentError::provider(&self.name, &e))?;
            if vectors.len() != batch.len() {
                return Err(ComponentError::new(
                    &self.name,
                    crate::errors::ComponentErrorKind::Provider,
                    format!("expected {} embeddings, got {}", batch.len(), vectors.len()),
                ));
            }
            embedded.extend(batch.iter().cloned().zip(vectors).map(|(chunk, embedding)| {
                EmbeddedChunk { chunk, embedding }
            }));
            debug!(component = %self.name, batch = batch.len(), "Embedded batch");
        }

        info!(
            component = %self.name,
            model = %self.model.model_id(),
            chunks = embedded.len(),
            "Embedded chunks"
        );
        ctx.insert("embedded_chunks", embedded);
        Ok(())
    }
}

/// Reads `query`, writes `query_embedding`.
///
/// When `image_urls` is present, each image is appended to the embedded text
/// as `[IMAGE] <file name>`, the same form loaded image documents carry.
pub struct QueryEmbedder {
    name: String,
    model: Arc<dyn EmbeddingModel>,
    enabled: bool,
}

impl fmt::Debug for QueryEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEmbedder")
            .field("name", &self.name)
            .field("model", &self.model.model_id())
            .finish()
    }
}

impl QueryEmbedder {
    /// Creates a query embedder.
    #[must_use]
    pub fn new(name: impl Into<String>, model: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            name: name.into(),
            model,
            enabled: true,
        }
    }

    /// Sets whether the embedder is enabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl PipelineComponent for QueryEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_keys(&self) -> Vec<String> {
        vec!["query".to_string()]
    }

    fn provided_keys(&self) -> Vec<String> {
        vec!["query_embedding".to_string()]
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn process(&self, ctx: &mut RunContext) -> Result<(), ComponentError> {
        let query = ctx.require_text(&self.name, "query")?;
        if query.trim().is_empty() {
            return Err(ComponentError::invalid_key(&self.name, "query", "query is empty"));
        }
        let images = ctx.text_list("image_urls").unwrap_or_default();
        let text = query_with_images(query, &images);
        if !images.is_empty() {
            debug!(component = %self.name, images = images.len(), "Embedding query with images");
        }
        let embedding = self
            .model
            .embed(&text)
            .await
            .map_err(|e| ComponentError::provider(&self.name, &e))?;
        ctx.insert("query_embedding", embedding);
        Ok(())
    }
}

fn image_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit(['/', '\\']).find(|s| !s.is_empty()).unwrap_or(path)
}

pub(crate) fn query_with_images(query: &str, image_urls: &[String]) -> String {
    let mut text = query.to_string();
    for url in image_urls {
        text.push_str("\n[IMAGE] ");
        text.push_str(image_name(url));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chunk, Document, EmbeddingVector, Metadata};
    use crate::errors::{ComponentErrorKind, ProviderError};
    use crate::providers::{HashingEmbedder, MockEmbeddingModel};

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk::whole(&Document::new(format!("chunk number {i}"), Metadata::new())))
            .collect()
    }

    #[tokio::test]
    async fn test_embeds_every_chunk_in_order() {
        let model = Arc::new(HashingEmbedder::new(16));
        let embedder = ChunkEmbedder::new("embedder", model.clone()).with_batch_size(2);
        let mut ctx = RunContext::new().with("chunks", chunks(5));

        embedder.process(&mut ctx).await.unwrap();

        let embedded = ctx.require_embedded("t", "embedded_chunks").unwrap();
        assert_eq!(embedded.len(), 5);
        assert_eq!(embedded[3].chunk.content(), "chunk number 3");
        assert_eq!(
            embedded[3].embedding,
            model.embed("chunk number 3").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_provider_failure_names_component() {
        let mut mock = MockEmbeddingModel::new();
        mock.expect_model_id().return_const("mock".to_string());
        mock.expect_embed_batch()
            .returning(|_| Err(ProviderError::request("mock", "rate limited")));

        let embedder = ChunkEmbedder::new("embedder", Arc::new(mock));
        let mut ctx = RunContext::new().with("chunks", chunks(1));
        let err = embedder.process(&mut ctx).await.unwrap_err();

        assert_eq!(err.kind, ComponentErrorKind::Provider);
        assert_eq!(err.component, "embedder");
        assert!(err.cause.contains("rate limited"));
        assert!(!ctx.contains_key("embedded_chunks"));
    }

    #[tokio::test]
    async fn test_short_batch_is_rejected() {
        let mut mock = MockEmbeddingModel::new();
        mock.expect_model_id().return_const("mock".to_string());
        mock.expect_embed_batch()
            .returning(|_| Ok(vec![EmbeddingVector::new("mock", vec![1.0])]));

        let embedder = ChunkEmbedder::new("embedder", Arc::new(mock));
        let mut ctx = RunContext::new().with("chunks", chunks(2));
        let err = embedder.process(&mut ctx).await.unwrap_err();
        assert!(err.cause.contains("expected 2 embeddings, got 1"));
    }

    #[tokio::test]
    async fn test_query_embedder() {
        let embedder = QueryEmbedder::new("q", Arc::new(HashingEmbedder::new(8)));
        let mut ctx = RunContext::new().with("query", "what is rust?");
        embedder.process(&mut ctx).await.unwrap();
        assert_eq!(ctx.require_embedding("t", "query_embedding").unwrap().dimensions(), 8);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let embedder = QueryEmbedder::new("q", Arc::new(HashingEmbedder::new(8)));
        let mut ctx = RunContext::new().with("query", "   ");
        let err = embedder.process(&mut ctx).await.unwrap_err();
        assert_eq!(err.kind, ComponentErrorKind::InvalidKey);
    }

    #[test]
    fn test_image_urls_are_named_like_loaded_images() {
        let urls = vec![
            "https://example.com/charts/revenue.png?size=large".to_string(),
            "/data/scans/page-1.jpg".to_string(),
        ];
        assert_eq!(
            query_with_images("what does this show?", &urls),
            "what does this show?\n[IMAGE] revenue.png\n[IMAGE] page-1.jpg"
        );
        assert_eq!(query_with_images("plain", &[]), "plain");
    }

    #[tokio::test]
    async fn test_query_embedding_includes_images() {
        let model = Arc::new(HashingEmbedder::new(64));
        let embedder = QueryEmbedder::new("query_embedder", model.clone());
        let mut ctx = RunContext::new()
            .with("query", "what does this show?")
            .with("image_urls", vec!["charts/revenue.png".to_string()]);

        embedder.process(&mut ctx).await.unwrap();

        let expected = model.embed("what does this show?\n[IMAGE] revenue.png").await.unwrap();
        assert_eq!(ctx.require_embedding("test", "query_embedding").unwrap(), &expected);
    }
}
