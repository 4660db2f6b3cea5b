//! The predefined indexing and query pipelines.

use super::{Pipeline, PipelineSpec};
use crate::components::{
    CHUNK_EMBEDDER, DOCUMENT_LOADER, QUERY_EMBEDDER, RESPONSE_GENERATOR, RETRIEVER, TEXT_SPLITTER,
    VECTOR_STORE_WRITER,
};
use crate::config::RagConfig;
use crate::core::Modality;
use crate::errors::RagifyError;
use crate::registry::{get_component_registry, ComponentConfig, ComponentRegistry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// A fixed ordering of built-in component types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// load, split, embed, store.
    Indexing,
    /// embed query, retrieve text and mixed chunks, generate.
    Query,
    /// Indexing with image loading and OCR sidecars.
    MultimodalIndexing,
    /// Query over every modality.
    MultimodalQuery,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indexing => write!(f, "indexing"),
            Self::Query => write!(f, "query"),
            Self::MultimodalIndexing => write!(f, "multimodal_indexing"),
            Self::MultimodalQuery => write!(f, "multimodal_query"),
        }
    }
}

impl FromStr for PipelineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "indexing" => Ok(Self::Indexing),
            "query" => Ok(Self::Query),
            "multimodal_indexing" => Ok(Self::MultimodalIndexing),
            "multimodal_query" => Ok(Self::MultimodalQuery),
            other => Err(format!("unknown pipeline kind '{other}'")),
        }
    }
}

impl PipelineKind {
    /// Returns true for the multimodal variants.
    #[must_use]
    pub fn is_multimodal(&self) -> bool {
        matches!(self, Self::MultimodalIndexing | Self::MultimodalQuery)
    }

    /// Returns true for the indexing variants.
    #[must_use]
    pub fn is_indexing(&self) -> bool {
        matches!(self, Self::Indexing | Self::MultimodalIndexing)
    }

    /// Component types in execution order.
    #[must_use]
    pub fn component_types(&self) -> &'static [&'static str] {
        if self.is_indexing() {
            &[DOCUMENT_LOADER, TEXT_SPLITTER, CHUNK_EMBEDDER, VECTOR_STORE_WRITER]
        } else {
            &[QUERY_EMBEDDER, RETRIEVER, RESPONSE_GENERATOR]
        }
    }

    /// Builds the spec, taking component options from `config`.
    #[must_use]
    pub fn spec(&self, config: &RagConfig) -> PipelineSpec {
        let components = if self.is_indexing() {
            self.indexing_components(config)
        } else {
            self.query_components(config)
        };
        PipelineSpec {
            name: self.to_string(),
            components,
        }
    }

    fn indexing_components(&self, config: &RagConfig) -> Vec<ComponentConfig> {
        let mm = &config.multimodal;
        let multimodal = self.is_multimodal();
        let r = &config.retrieval;
        vec![
            ComponentConfig::new(DOCUMENT_LOADER)
                .with_option("multimodal", json!(multimodal))
                .with_option("ocr_enabled", json!(multimodal && mm.ocr_enabled))
                .with_option("embed_images", json!(mm.image_processing.enabled))
                .with_option("max_image_bytes", json!(mm.image_processing.max_size)),
            ComponentConfig::new(TEXT_SPLITTER)
                .with_option("chunk_size", json!(r.chunk_size))
                .with_option("chunk_overlap", json!(r.chunk_overlap))
                .with_option("min_chunk_length", json!(r.min_chunk_length)),
            ComponentConfig::new(CHUNK_EMBEDDER),
            ComponentConfig::new(VECTOR_STORE_WRITER),
        ]
    }

    fn query_components(&self, config: &RagConfig) -> Vec<ComponentConfig> {
        let r = &config.retrieval;
        let modalities: Vec<String> = if self.is_multimodal() {
            Modality::ALL.iter().map(ToString::to_string).collect()
        } else {
            vec![Modality::Text.to_string(), Modality::Mixed.to_string()]
        };

        let mut retriever = ComponentConfig::new(RETRIEVER)
            .with_option("k", json!(r.k))
            .with_option("metric", json!(r.metric.to_string()))
            .with_option("modalities", json!(modalities));
        if let Some(threshold) = r.score_threshold {
            retriever = retriever.with_option("score_threshold", json!(threshold));
        }

        vec![
            ComponentConfig::new(QUERY_EMBEDDER),
            retriever,
            ComponentConfig::new(RESPONSE_GENERATOR)
                .with_option("temperature", json!(config.llm.temperature))
                .with_option("max_tokens", json!(config.llm.max_tokens)),
        ]
    }
}

/// Builds a predefined pipeline from `config` through `registry`.
pub fn create_pipeline(
    kind: PipelineKind,
    config: &RagConfig,
    registry: &ComponentRegistry,
) -> Result<Pipeline, RagifyError> {
    Pipeline::from_spec(&kind.spec(config), registry)
}

/// Builds a predefined pipeline through the global component registry.
///
/// Call [`components::init`](crate::components::init) first to seed it.
pub fn create_registered_pipeline(kind: PipelineKind, config: &RagConfig) -> Result<Pipeline, RagifyError> {
    create_pipeline(kind, config, &get_component_registry())
}
