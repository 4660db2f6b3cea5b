//! In-memory vector store with optional JSON persistence.

use super::{SearchQuery, StoreInfo, VectorStore};
use crate::core::{Chunk, EmbeddedChunk, EmbeddingVector, RetrievedChunk};
use crate::errors::StoreError;
use crate::ranking::{rank, Candidate};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    seq: u64,
    chunk: Chunk,
    embedding: EmbeddingVector,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collection {
    next_seq: u64,
    entries: Vec<StoredChunk>,
    #[serde(skip)]
    by_id: HashMap<String, usize>,
}

impl Collection {
    fn reindex(&mut self) {
        self.by_id = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.chunk.id().to_string(), i))
            .collect();
    }

    fn upsert(&mut self, item: EmbeddedChunk) -> String {
        let id = item.chunk.id().to_string();
        if let Some(&pos) = self.by_id.get(&id) {
            let entry = &mut self.entries[pos];
            entry.chunk = item.chunk;
            entry.embedding = item.embedding;
        } else {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.by_id.insert(id.clone(), self.entries.len());
            self.entries.push(StoredChunk {
                seq,
                chunk: item.chunk,
                embedding: item.embedding,
            });
        }
        id
    }
}

/// A vector store that keeps all chunks in memory.
///
/// When opened with a persist directory, the collection is loaded from and
/// written back to `<dir>/<collection>.json` after every mutation. Reads and
/// writes are internally locked; a `clear` racing a `search` still needs
/// external coordination to get a meaningful result.
#[derive(Debug)]
pub struct InMemoryVectorStore {
    collection: String,
    persist_path: Option<PathBuf>,
    state: RwLock<Collection>,
    persist_lock: tokio::sync::Mutex<()>,
}

impl InMemoryVectorStore {
    /// Creates an empty, non-persistent store.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            persist_path: None,
            state: RwLock::new(Collection::default()),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Opens a persistent store, loading any existing collection file.
    pub fn open(persist_directory: impl AsRef<Path>, collection: impl Into<String>) -> Result<Self, StoreError> {
        let collection = collection.into();
        let path = persist_directory.as_ref().join(format!("{collection}.json"));

        let mut state = if path.exists() {
            let bytes = std::fs::read(&path).map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
            serde_json::from_slice::<Collection>(&bytes)
                .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))?
        } else {
            Collection::default()
        };
        state.reindex();
        info!(
            collection = %collection,
            path = %path.display(),
            chunks = state.entries.len(),
            "Opened vector store"
        );

        Ok(Self {
            collection,
            persist_path: Some(path),
            state: RwLock::new(state),
            persist_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Returns the collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock().await;
        let bytes = {
            let state = self.state.read();
            serde_json::to_vec(&*state).map_err(|e| StoreError::Serialization(e.to_string()))?
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(format!("{}: {e}", parent.display())))?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "Persisted vector store");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, chunks: Vec<EmbeddedChunk>) -> Result<Vec<String>, StoreError> {
        let ids = {
            let mut state = self.state.write();
            chunks.into_iter().map(|c| state.upsert(c)).collect::<Vec<_>>()
        };
        self.persist().await?;
        Ok(ids)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        {
            let mut state = self.state.write();
            state.entries.clear();
            state.by_id.clear();
        }
        info!(collection = %self.collection, "Cleared vector store");
        self.persist().await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.state.read().entries.len())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RetrievedChunk>, StoreError> {
        let state = self.state.read();
        let candidates = state
            .entries
            .iter()
            .filter(|e| query.accepts(e.chunk.modality()))
            .map(|e| Candidate {
                seq: e.seq,
                embedding: &e.embedding,
                item: &e.chunk,
            });

        let ranked = rank(&query.embedding, candidates, query.metric, query.k)?;
        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(position, r)| RetrievedChunk {
                chunk: r.item.clone(),
                score: r.score,
                rank: position,
            })
            .collect())
    }

    async fn info(&self) -> Result<StoreInfo, StoreError> {
        let state = self.state.read();
        let models: BTreeSet<String> = state
            .entries
            .iter()
            .map(|e| e.embedding.model().to_string())
            .collect();
        Ok(StoreInfo {
            store_type: "in_memory".to_string(),
            collection: self.collection.clone(),
            chunk_count: state.entries.len(),
            persist_path: self.persist_path.as_ref().map(|p| p.display().to_string()),
            embedding_models: models.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Document, Metadata, Modality};
    use crate::ranking::SimilarityMetric;

    fn embedded(text: &str, values: Vec<f32>) -> EmbeddedChunk {
        let doc = Document::new(text, Metadata::new());
        EmbeddedChunk {
            chunk: Chunk::whole(&doc),
            embedding: EmbeddingVector::new("m", values),
        }
    }

    #[tokio::test]
    async fn test_add_and_search() {
        let store = InMemoryVectorStore::new("docs");
        store
            .add(vec![
                embedded("north", vec![0.0, 1.0]),
                embedded("east", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let query = SearchQuery::new(EmbeddingVector::new("m", vec![1.0, 0.1]), 1);
        let hits = store.search(&query).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.content(), "east");
        assert_eq!(hits[0].rank, 0);
    }

    #[tokio::test]
    async fn test_re_adding_same_chunk_replaces() {
        let store = InMemoryVectorStore::new("docs");
        store.add(vec![embedded("a", vec![1.0])]).await.unwrap();
        store.add(vec![embedded("a", vec![1.0])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_empties_store() {
        let store = InMemoryVectorStore::new("docs");
        store.add(vec![embedded("a", vec![1.0])]).await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        let hits = store
            .search(&SearchQuery::new(EmbeddingVector::new("m", vec![1.0]), 4))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_modality_filter() {
        let store = InMemoryVectorStore::new("docs");
        let image_doc = Document::with_modality("a diagram", Modality::Image, Metadata::new());
        store
            .add(vec![
                embedded("text chunk", vec![1.0, 0.0]),
                EmbeddedChunk {
                    chunk: Chunk::whole(&image_doc),
                    embedding: EmbeddingVector::new("m", vec![1.0, 0.0]),
                },
            ])
            .await
            .unwrap();

        let query = SearchQuery::new(EmbeddingVector::new("m", vec![1.0, 0.0]), 10)
            .with_modalities(vec![Modality::Image]);
        let hits = store.search(&query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.modality(), Modality::Image);
    }

    #[tokio::test]
    async fn test_search_rejects_other_model() {
        let store = InMemoryVectorStore::new("docs");
        store.add(vec![embedded("a", vec![1.0])]).await.unwrap();

        let query = SearchQuery::new(EmbeddingVector::new("other", vec![1.0]), 1)
            .with_metric(SimilarityMetric::InnerProduct);
        let err = store.search(&query).await.unwrap_err();
        assert!(matches!(err, StoreError::Incomparable(_)));
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = InMemoryVectorStore::open(dir.path(), "kb").unwrap();
            store
                .add(vec![embedded("a", vec![1.0]), embedded("b", vec![0.5])])
                .await
                .unwrap();
        }

        let reopened = InMemoryVectorStore::open(dir.path(), "kb").unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        let info = reopened.info().await.unwrap();
        assert_eq!(info.collection, "kb");
        assert_eq!(info.embedding_models, vec!["m".to_string()]);

        reopened.add(vec![embedded("c", vec![0.1])]).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 3);
    }
}
