//! A local, deterministic embedding model based on feature hashing.

use super::EmbeddingModel;
use crate::core::EmbeddingVector;
use crate::errors::ProviderError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Embeds text by hashing lowercase word tokens into a fixed number of
/// signed buckets and L2-normalizing the result.
///
/// Needs no network or model files. Texts that share vocabulary land close
/// together under cosine similarity, which is enough for local indexing and
/// for tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    model_id: String,
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl HashingEmbedder {
    /// Creates an embedder with the given dimension (at least 1).
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            model_id: format!("hashing-{dimensions}"),
            dimensions,
        }
    }

    /// Returns the output dimension.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[allow(clippy::cast_possible_truncation)]
    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut values = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            values[bucket] += sign;
        }
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut values {
                *v /= norm;
            }
        }
        values
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingModel for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingVector, ProviderError> {
        Ok(EmbeddingVector::new(self.model_id.clone(), self.vectorize(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::SimilarityMetric;

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let model = HashingEmbedder::new(64);
        let a = model.embed("Rust ownership rules").await.unwrap();
        let b = model.embed("rust OWNERSHIP rules!").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a.dimensions(), 64);
        assert_eq!(a.model(), "hashing-64");
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let model = HashingEmbedder::new(256);
        let query = model.embed("photosynthesis in plants").await.unwrap();
        let close = model.embed("plants perform photosynthesis").await.unwrap();
        let far = model.embed("the stock market closed lower").await.unwrap();

        let metric = SimilarityMetric::Cosine;
        assert!(metric.score(&query, &close) > metric.score(&query, &far));
    }

    #[tokio::test]
    async fn test_empty_text_yields_zero_vector() {
        let model = HashingEmbedder::new(8);
        let v = model.embed("   ").await.unwrap();
        assert!(v.values().iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_embed_batch_matches_single() {
        let model = HashingEmbedder::new(32);
        let batch = model
            .embed_batch(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(batch[1], model.embed("two").await.unwrap());
    }
}
