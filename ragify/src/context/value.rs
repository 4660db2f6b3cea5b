//! Typed values stored in a run context.

use crate::core::{Chunk, Document, EmbeddedChunk, EmbeddingVector, RetrievedChunk};
use serde::{Deserialize, Serialize};

/// A value stored under a context key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContextValue {
    /// Explicit absence of a value.
    Null,
    /// A boolean flag.
    Bool(bool),
    /// An integer.
    Integer(i64),
    /// A float.
    Float(f64),
    /// A string.
    Text(String),
    /// A list of strings.
    TextList(Vec<String>),
    /// A list of floats.
    FloatList(Vec<f64>),
    /// Loaded or cleaned documents.
    Documents(Vec<Document>),
    /// Chunks cut from documents.
    Chunks(Vec<Chunk>),
    /// Chunks with embeddings.
    Embedded(Vec<EmbeddedChunk>),
    /// A single embedding, such as a query embedding.
    Embedding(EmbeddingVector),
    /// Ranked search results.
    Retrieved(Vec<RetrievedChunk>),
    /// Arbitrary structured data.
    Json(serde_json::Value),
}

impl ContextValue {
    /// Returns a short name for the variant, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::TextList(_) => "text_list",
            Self::FloatList(_) => "float_list",
            Self::Documents(_) => "documents",
            Self::Chunks(_) => "chunks",
            Self::Embedded(_) => "embedded",
            Self::Embedding(_) => "embedding",
            Self::Retrieved(_) => "retrieved",
            Self::Json(_) => "json",
        }
    }

    /// Converts plain JSON input into the closest typed value.
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Json(Value::Number(n))),
            Value::String(s) => Self::Text(s),
            Value::Array(items) if items.iter().all(Value::is_string) => Self::TextList(
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            other => Self::Json(other),
        }
    }

    /// Renders the value as JSON for callers outside the engine.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{json, Value};
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => json!(b),
            Self::Integer(i) => json!(i),
            Self::Float(f) => json!(f),
            Self::Text(s) => json!(s),
            Self::TextList(items) => json!(items),
            Self::FloatList(items) => json!(items),
            Self::Documents(docs) => serde_json::to_value(docs).unwrap_or(Value::Null),
            Self::Chunks(chunks) => serde_json::to_value(chunks).unwrap_or(Value::Null),
            Self::Embedded(items) => serde_json::to_value(items).unwrap_or(Value::Null),
            Self::Embedding(v) => serde_json::to_value(v).unwrap_or(Value::Null),
            Self::Retrieved(items) => serde_json::to_value(items).unwrap_or(Value::Null),
            Self::Json(v) => v.clone(),
        }
    }
}

impl From<bool> for ContextValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ContextValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<usize> for ContextValue {
    fn from(v: usize) -> Self {
        Self::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ContextValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(v: Vec<String>) -> Self {
        Self::TextList(v)
    }
}

impl From<Vec<f64>> for ContextValue {
    fn from(v: Vec<f64>) -> Self {
        Self::FloatList(v)
    }
}

impl From<Vec<Document>> for ContextValue {
    fn from(v: Vec<Document>) -> Self {
        Self::Documents(v)
    }
}

impl From<Vec<Chunk>> for ContextValue {
    fn from(v: Vec<Chunk>) -> Self {
        Self::Chunks(v)
    }
}

impl From<Vec<EmbeddedChunk>> for ContextValue {
    fn from(v: Vec<EmbeddedChunk>) -> Self {
        Self::Embedded(v)
    }
}

impl From<EmbeddingVector> for ContextValue {
    fn from(v: EmbeddingVector) -> Self {
        Self::Embedding(v)
    }
}

impl From<Vec<RetrievedChunk>> for ContextValue {
    fn from(v: Vec<RetrievedChunk>) -> Self {
        Self::Retrieved(v)
    }
}

impl From<serde_json::Value> for ContextValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}
