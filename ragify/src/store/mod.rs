//! Vector store abstraction.
//!
//! Components only see [`VectorStore`]. The bundled [`InMemoryVectorStore`]
//! keeps everything in memory and can persist the collection as JSON.

mod memory;

pub use memory::InMemoryVectorStore;

use crate::core::{EmbeddedChunk, EmbeddingVector, Modality, RetrievedChunk};
use crate::errors::StoreError;
use crate::ranking::SimilarityMetric;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Parameters for a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// The query embedding.
    pub embedding: EmbeddingVector,
    /// Maximum number of results.
    pub k: usize,
    /// Similarity metric.
    pub metric: SimilarityMetric,
    /// Only chunks of these modalities are considered. `None` means all.
    pub modalities: Option<Vec<Modality>>,
}

impl SearchQuery {
    /// Creates a cosine search over all modalities.
    #[must_use]
    pub fn new(embedding: EmbeddingVector, k: usize) -> Self {
        Self {
            embedding,
            k,
            metric: SimilarityMetric::Cosine,
            modalities: None,
        }
    }

    /// Sets the metric.
    #[must_use]
    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Restricts the modalities considered.
    #[must_use]
    pub fn with_modalities(mut self, modalities: Vec<Modality>) -> Self {
        self.modalities = Some(modalities);
        self
    }

    /// Returns true if a chunk of `modality` passes the filter.
    #[must_use]
    pub fn accepts(&self, modality: Modality) -> bool {
        self.modalities
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&modality))
    }
}

/// Summary of a store's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    /// The store implementation.
    pub store_type: String,
    /// The collection name.
    pub collection: String,
    /// Number of stored chunks.
    pub chunk_count: usize,
    /// Where the collection is persisted, if anywhere.
    pub persist_path: Option<String>,
    /// Model tags present in the collection.
    pub embedding_models: Vec<String>,
}

/// Stores embedded chunks and answers similarity searches.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Adds chunks. A chunk whose ID is already stored replaces the old
    /// entry in place. Returns the stored IDs in input order.
    async fn add(&self, chunks: Vec<EmbeddedChunk>) -> Result<Vec<String>, StoreError>;

    /// Removes every chunk.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Returns the number of stored chunks.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Returns the `k` best matches, best first.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RetrievedChunk>, StoreError>;

    /// Describes the store.
    async fn info(&self) -> Result<StoreInfo, StoreError>;
}
