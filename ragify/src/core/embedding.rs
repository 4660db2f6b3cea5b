//! Embedding vectors tagged with the model that produced them.

use serde::{Deserialize, Serialize};

/// A fixed-length vector produced by an embedding model.
///
/// Two vectors are comparable only if they carry the same model tag and
/// have the same dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    model: String,
    values: Vec<f32>,
}

impl EmbeddingVector {
    /// Creates a vector tagged with `model`.
    #[must_use]
    pub fn new(model: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            model: model.into(),
            values,
        }
    }

    /// Returns the model tag.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the raw values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Returns the dimension.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this vector may be compared with `other`.
    #[must_use]
    pub fn is_comparable(&self, other: &Self) -> bool {
        self.model == other.model && self.values.len() == other.values.len()
    }

    /// Returns the L2 norm.
    #[must_use]
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Returns a unit-length copy. Zero vectors are returned unchanged.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let norm = self.norm();
        if norm == 0.0 {
            return self.clone();
        }
        Self {
            model: self.model.clone(),
            values: self.values.iter().map(|v| v / norm).collect(),
        }
    }
}
