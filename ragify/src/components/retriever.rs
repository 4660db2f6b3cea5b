//! Similarity retrieval over the vector store.

use super::{ComponentPorts, PipelineComponent};
use crate::context::RunContext;
use crate::core::Modality;
use crate::errors::ComponentError;
use crate::ranking::SimilarityMetric;
use crate::registry::{ComponentFactory, ConfigSchema, OptionSpec, ResolvedConfig};
use crate::store::{SearchQuery, VectorStore};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Results returned when neither options nor context set `k`.
pub const DEFAULT_K: usize = 4;

fn default_k() -> usize {
    DEFAULT_K
}

/// Options for [`Retriever`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetrieverOptions {
    /// Maximum number of chunks returned. A `k` context key overrides it.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Similarity metric, fixed for the pipeline.
    #[serde(default)]
    pub metric: SimilarityMetric,
    /// Results scoring below this are dropped.
    #[serde(default)]
    pub score_threshold: Option<f32>,
    /// Modalities considered. Empty means all.
    #[serde(default)]
    pub modalities: Vec<Modality>,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            metric: SimilarityMetric::Cosine,
            score_threshold: None,
            modalities: Vec::new(),
        }
    }
}

impl RetrieverOptions {
    /// Sets `k`.
    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Sets the metric.
    #[must_use]
    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Sets the score threshold.
    #[must_use]
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    /// Restricts retrieval to these modalities.
    #[must_use]
    pub fn with_modalities(mut self, modalities: Vec<Modality>) -> Self {
        self.modalities = modalities;
        self
    }
}

pub(crate) fn schema() -> ConfigSchema {
    let modalities: Vec<String> = Modality::ALL.iter().map(ToString::to_string).collect();
    ConfigSchema::new()
        .option(
            OptionSpec::integer("k")
                .default_value(json!(DEFAULT_K))
                .min(1.0)
                .describe("Maximum number of chunks returned"),
        )
        .option(
            OptionSpec::one_of("metric", &["cosine", "inner_product"])
                .default_value(json!("cosine")),
        )
        .option(OptionSpec::float("score_threshold").describe("Drop results scoring below this"))
        .option(
            OptionSpec::string_list("modalities")
                .default_value(json!(modalities))
                .describe("Any of text, image, mixed"),
        )
}

pub(crate) fn factory(ports: ComponentPorts) -> ComponentFactory {
    Arc::new(move |cfg: &ResolvedConfig| {
        let store = ports.require_store(&cfg.instance_name)?;
        let options: RetrieverOptions = cfg.deserialize()?;
        Ok(Arc::new(Retriever::new(&cfg.instance_name, store, options).enabled(cfg.enabled()))
            as Arc<dyn PipelineComponent>)
    })
}

/// Reads `query_embedding`, writes `documents` and `retrieval_scores`.
pub struct Retriever {
    name: String,
    store: Arc<dyn VectorStore>,
    options: RetrieverOptions,
    enabled: bool,
}

impl fmt::Debug for Retriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retriever")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    /// Creates a retriever.
    #[must_use]
    pub fn new(name: impl Into<String>, store: Arc<dyn VectorStore>, options: RetrieverOptions) -> Self {
        Self {
            name: name.into(),
            store,
            options,
            enabled: true,
        }
    }

    /// Sets whether the retriever is enabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn effective_k(&self, ctx: &RunContext) -> Result<usize, ComponentError> {
        match ctx.integer("k") {
            None => Ok(self.options.k),
            Some(k) if k >= 1 => usize::try_from(k)
                .map_err(|_| ComponentError::invalid_key(&self.name, "k", format!("k {k} is too large"))),
            Some(k) => Err(ComponentError::invalid_key(
                &self.name,
                "k",
                format!("k must be at least 1, got {k}"),
            )),
        }
    }
}

#[async_trait]
impl PipelineComponent for Retriever {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_keys(&self) -> Vec<String> {
        vec!["query_embedding".to_string()]
    }

    fn provided_keys(&self) -> Vec<String> {
        vec!["documents".to_string(), "retrieval_scores".to_string()]
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn similarity_metric(&self) -> Option<SimilarityMetric> {
        Some(self.options.metric)
    }

    async fn process(&self, ctx: &mut RunContext) -> Result<(), ComponentError> {
        let embedding = ctx.require_embedding(&self.name, "query_embedding")?.clone();
        let k = self.effective_k(ctx)?;

        let mut query = SearchQuery::new(embedding, k).with_metric(self.options.metric);
        if !self.options.modalities.is_empty() {
            query = query.with_modalities(self.options.modalities.clone());
        }

        let mut results = self
            .store
            .search(&query)
            .await
            .map_err(|e| ComponentError::store(&self.name, &e))?;
        debug!(component = %self.name, k, found = results.len(), "Searched vector store");

        if let Some(threshold) = self.options.score_threshold {
            results.retain(|r| r.score >= threshold);
            for (rank, r) in results.iter_mut().enumerate() {
                r.rank = rank;
            }
        }

        let scores: Vec<f64> = results.iter().map(|r| f64::from(r.score)).collect();
        info!(component = %self.name, retrieved = results.len(), "Retrieved chunks");
        ctx.insert("documents", results);
        ctx.insert("retrieval_scores", scores);
        Ok(())
    }
}
