//! The mutable key-value context threaded through a pipeline run.

use super::value::ContextValue;
use crate::core::{Chunk, Document, EmbeddedChunk, EmbeddingVector, RetrievedChunk};
use crate::errors::ComponentError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Key-value context passed from component to component.
///
/// Keys are ordered so that two runs over identical inputs produce
/// identical contexts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    values: BTreeMap<String, ContextValue>,
}

macro_rules! require_variant {
    ($(#[$doc:meta])* $fn_name:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $fn_name(&self, component: &str, key: &str) -> Result<&$ty, ComponentError> {
            match self.require(component, key)? {
                ContextValue::$variant(v) => Ok(v),
                other => Err(ComponentError::invalid_key(
                    component,
                    key,
                    format!(
                        "expected {}, found {}",
                        stringify!($variant).to_lowercase(),
                        other.type_name()
                    ),
                )),
            }
        }
    };
}

impl RunContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from a JSON object, converting each value to its
    /// closest typed form. Non-object input yields an empty context.
    #[must_use]
    pub fn from_json(input: serde_json::Value) -> Self {
        let mut ctx = Self::new();
        if let serde_json::Value::Object(map) = input {
            for (key, value) in map {
                ctx.insert(key, ContextValue::from_json(value));
            }
        }
        ctx
    }

    /// Adds a value, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces a value, returning the previous one.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
    ) -> Option<ContextValue> {
        self.values.insert(key.into(), value.into())
    }

    /// Removes a value. The pipeline rejects removals of keys a component
    /// does not declare as provided.
    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.values.remove(key)
    }

    /// Takes a value out of the context for in-place rewriting.
    pub fn take(&mut self, key: &str) -> Option<ContextValue> {
        self.values.remove(key)
    }

    /// Returns a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the key set.
    #[must_use]
    pub fn key_set(&self) -> BTreeSet<String> {
        self.values.keys().cloned().collect()
    }

    /// Returns an iterator over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.values.iter()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Renders the whole context as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Returns a value or a missing-key error attributed to `component`.
    pub fn require(&self, component: &str, key: &str) -> Result<&ContextValue, ComponentError> {
        self.values
            .get(key)
            .ok_or_else(|| ComponentError::missing_key(component, key))
    }

    require_variant!(
        /// Returns a text value.
        require_text, Text, String
    );
    require_variant!(
        /// Returns a document list.
        require_documents, Documents, Vec<Document>
    );
    require_variant!(
        /// Returns a chunk list.
        require_chunks, Chunks, Vec<Chunk>
    );
    require_variant!(
        /// Returns an embedded chunk list.
        require_embedded, Embedded, Vec<EmbeddedChunk>
    );
    require_variant!(
        /// Returns a single embedding.
        require_embedding, Embedding, EmbeddingVector
    );
    require_variant!(
        /// Returns ranked search results.
        require_retrieved, Retrieved, Vec<RetrievedChunk>
    );

    /// Returns a text value, or `None` when absent or of another type.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ContextValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns a boolean, or `None` when absent or of another type.
    #[must_use]
    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(ContextValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Returns an integer, or `None` when absent or of another type.
    #[must_use]
    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(ContextValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Returns a float. Integers are widened.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn float(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(ContextValue::Float(f)) => Some(*f),
            Some(ContextValue::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns a string list. A single string is treated as a one-item list.
    #[must_use]
    pub fn text_list(&self, key: &str) -> Option<Vec<String>> {
        match self.values.get(key) {
            Some(ContextValue::TextList(items)) => Some(items.clone()),
            Some(ContextValue::Text(s)) => Some(vec![s.clone()]),
            _ => None,
        }
    }

    /// Returns a JSON value.
    #[must_use]
    pub fn json(&self, key: &str) -> Option<&serde_json::Value> {
        match self.values.get(key) {
            Some(ContextValue::Json(v)) => Some(v),
            _ => None,
        }
    }
}

impl FromIterator<(String, ContextValue)> for RunContext {
    fn from_iter<I: IntoIterator<Item = (String, ContextValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
