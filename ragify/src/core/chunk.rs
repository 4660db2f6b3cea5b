//! Chunks and their embedded and retrieved forms.

use super::document::{content_id, Document, Metadata, Modality};
use super::embedding::EmbeddingVector;
use serde::{Deserialize, Serialize};

/// A contiguous segment of a document.
///
/// `start..end` are byte offsets into the parent document's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    id: String,
    document_id: String,
    content: String,
    modality: Modality,
    start: usize,
    end: usize,
    index: usize,
    total: usize,
    #[serde(default)]
    metadata: Metadata,
}

impl Chunk {
    /// Cuts a chunk from `document` covering `start..end`.
    ///
    /// The chunk inherits the document's metadata and modality and gains
    /// `chunk_index` and `chunk_total` entries. Returns `None` if the range is
    /// empty or not on character boundaries.
    #[must_use]
    pub fn from_document(
        document: &Document,
        start: usize,
        end: usize,
        index: usize,
        total: usize,
    ) -> Option<Self> {
        let content = document.content().get(start..end)?;
        if content.is_empty() {
            return None;
        }
        Some(Self::from_parts(document, content.to_string(), start, end, index, total))
    }

    /// Wraps a whole document as a single chunk without slicing it.
    #[must_use]
    pub fn whole(document: &Document) -> Self {
        let end = document.content().len();
        Self::from_parts(document, document.content().to_string(), 0, end, 0, 1)
    }

    fn from_parts(
        document: &Document,
        content: String,
        start: usize,
        end: usize,
        index: usize,
        total: usize,
    ) -> Self {
        let id = content_id(&[document.id(), &start.to_string(), &end.to_string()]);
        let mut metadata = document.metadata().clone();
        metadata.insert("chunk_index".to_string(), serde_json::json!(index));
        metadata.insert("chunk_total".to_string(), serde_json::json!(total));
        Self {
            id,
            document_id: document.id().to_string(),
            content,
            modality: document.modality(),
            start,
            end,
            index,
            total,
            metadata,
        }
    }

    /// Returns the chunk ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the ID of the document this chunk came from.
    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Returns the chunk text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the modality.
    #[must_use]
    pub fn modality(&self) -> Modality {
        self.modality
    }

    /// Returns the byte range within the parent document.
    #[must_use]
    pub fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// Returns the position of this chunk within its document.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the number of chunks cut from the parent document.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns the `source` metadata entry, if present.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(serde_json::Value::as_str)
    }
}

/// A chunk paired with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// The chunk.
    pub chunk: Chunk,
    /// The chunk's embedding.
    pub embedding: EmbeddingVector,
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// The chunk.
    pub chunk: Chunk,
    /// Similarity to the query under the search metric.
    pub score: f32,
    /// Zero-based position in the ranked result.
    pub rank: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        let mut meta = Metadata::new();
        meta.insert("source".to_string(), json!("notes.md"));
        Document::new("alpha beta gamma", meta)
    }

    #[test]
    fn test_chunk_inherits_metadata_and_provenance() {
        let d = doc();
        let chunk = Chunk::from_document(&d, 6, 10, 1, 3).unwrap();

        assert_eq!(chunk.content(), "beta");
        assert_eq!(chunk.document_id(), d.id());
        assert_eq!(chunk.source(), Some("notes.md"));
        assert_eq!(chunk.metadata()["chunk_index"], json!(1));
        assert_eq!(chunk.metadata()["chunk_total"], json!(3));
        assert_eq!(chunk.span(), (6, 10));
    }

    #[test]
    fn test_chunk_rejects_empty_or_invalid_range() {
        let d = doc();
        assert!(Chunk::from_document(&d, 3, 3, 0, 1).is_none());
        assert!(Chunk::from_document(&d, 0, 500, 0, 1).is_none());
    }

    #[test]
    fn test_chunk_id_depends_on_span() {
        let d = doc();
        let a = Chunk::from_document(&d, 0, 5, 0, 2).unwrap();
        let b = Chunk::from_document(&d, 6, 10, 1, 2).unwrap();
        let a2 = Chunk::from_document(&d, 0, 5, 0, 2).unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a2.id());
    }

    #[test]
    fn test_whole_document_chunk() {
        let d = doc();
        let chunk = Chunk::whole(&d);
        assert_eq!(chunk.content(), d.content());
        assert_eq!(chunk.total(), 1);
    }
}
