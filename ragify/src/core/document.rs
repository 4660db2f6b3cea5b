//! Source documents.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Free-form document and chunk metadata.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// The content modality of a document or chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Plain text.
    #[default]
    Text,
    /// An image, carried as base64 in metadata with a textual description as content.
    Image,
    /// An image with extracted text.
    Mixed,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "mixed" => Ok(Self::Mixed),
            other => Err(format!("unknown modality '{other}'")),
        }
    }
}

impl Modality {
    /// All modalities, in declaration order.
    pub const ALL: [Self; 3] = [Self::Text, Self::Image, Self::Mixed];
}

/// A unit of source content.
///
/// Documents are immutable once created. Transformations produce new
/// documents that keep a reference to the document they were derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: String,
    content: String,
    modality: Modality,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    derived_from: Option<String>,
}

impl Document {
    /// Creates a text document. The ID is derived from the `source` metadata
    /// (if any) and the content, so reloading the same file yields the same ID.
    #[must_use]
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self::with_modality(content, Modality::Text, metadata)
    }

    /// Creates a document with an explicit modality.
    #[must_use]
    pub fn with_modality(content: impl Into<String>, modality: Modality, metadata: Metadata) -> Self {
        let content = content.into();
        let source = metadata
            .get("source")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let id = content_id(&[source, modality.to_string().as_str(), &content]);
        Self {
            id,
            content,
            modality,
            metadata,
            derived_from: None,
        }
    }

    /// Returns the document ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the modality.
    #[must_use]
    pub fn modality(&self) -> Modality {
        self.modality
    }

    /// Returns the metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns a metadata value as a string.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }

    /// Returns the ID of the document this one was derived from.
    #[must_use]
    pub fn derived_from(&self) -> Option<&str> {
        self.derived_from.as_deref()
    }

    /// Returns the `source` metadata entry, if present.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata_str("source")
    }

    /// Produces a new document with replaced content. Metadata and modality
    /// are inherited and provenance points back at `self`.
    #[must_use]
    pub fn derive(&self, content: impl Into<String>) -> Self {
        let content = content.into();
        let id = content_id(&[&self.id, &content]);
        Self {
            id,
            content,
            modality: self.modality,
            metadata: self.metadata.clone(),
            derived_from: Some(self.id.clone()),
        }
    }

    /// Produces a new document with an extra metadata entry.
    #[must_use]
    pub fn with_metadata(&self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut metadata = self.metadata.clone();
        metadata.insert(key.into(), value);
        Self {
            id: self.id.clone(),
            content: self.content.clone(),
            modality: self.modality,
            metadata,
            derived_from: self.derived_from.clone(),
        }
    }
}

/// Hashes the given parts into a stable 32-character hex ID.
pub(crate) fn content_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}
