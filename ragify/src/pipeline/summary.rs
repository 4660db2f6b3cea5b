//! Human-oriented summaries of finished indexing and query runs.

use crate::context::{ContextValue, RunContext};
use crate::core::Modality;
use serde::{Deserialize, Serialize};

/// How many distinct sources [`QuerySummary`] keeps.
const TOP_SOURCES: usize = 3;

/// What an indexing run loaded and stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexingSummary {
    /// Documents produced by the loader.
    pub documents_loaded: usize,
    /// Chunks produced by the splitter.
    pub chunks_created: usize,
    /// Chunks written to the store by this run.
    pub chunks_indexed: usize,
    /// Chunks in the store after the run.
    pub store_total: usize,
    /// Loaded documents with image or mixed modality.
    pub multimodal_documents: usize,
    /// `multimodal_documents / documents_loaded`, or 0 with nothing loaded.
    pub multimodal_share: f64,
}

impl IndexingSummary {
    /// Reads the keys written by the indexing components. Missing keys
    /// count as zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_context(ctx: &RunContext) -> Self {
        let (documents_loaded, multimodal_documents) = match ctx.get("documents") {
            Some(ContextValue::Documents(docs)) => (
                docs.len(),
                docs.iter().filter(|d| d.modality() != Modality::Text).count(),
            ),
            _ => (
                ctx.json("loader_stats")
                    .and_then(|s| s["document_count"].as_u64())
                    .map_or(0, to_usize),
                0,
            ),
        };

        let chunks_created = match ctx.get("chunks") {
            Some(ContextValue::Chunks(chunks)) => chunks.len(),
            _ => count(ctx, "chunk_count"),
        };

        let store_total = ctx
            .json("vectorstore_info")
            .and_then(|info| info["chunk_count"].as_u64())
            .map_or(0, to_usize);

        let multimodal_share = if documents_loaded == 0 {
            0.0
        } else {
            multimodal_documents as f64 / documents_loaded as f64
        };

        Self {
            documents_loaded,
            chunks_created,
            chunks_indexed: count(ctx, "chunks_indexed"),
            store_total,
            multimodal_documents,
            multimodal_share,
        }
    }
}

/// What a query run retrieved and answered.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuerySummary {
    /// Number of retrieved chunks.
    pub retrieved: usize,
    /// Mean retrieval score, if anything was retrieved.
    pub average_score: Option<f64>,
    /// Distinct sources of the best-ranked chunks, best first.
    pub top_sources: Vec<String>,
    /// Whether the generator produced a response.
    pub response_generated: bool,
}

impl QuerySummary {
    /// Reads the keys written by the query components.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_context(ctx: &RunContext) -> Self {
        let Some(ContextValue::Retrieved(results)) = ctx.get("documents") else {
            return Self {
                response_generated: ctx.bool("response_generated").unwrap_or(false),
                ..Self::default()
            };
        };

        let average_score = (!results.is_empty()).then(|| {
            results.iter().map(|r| f64::from(r.score)).sum::<f64>() / results.len() as f64
        });

        let mut top_sources: Vec<String> = Vec::with_capacity(TOP_SOURCES);
        for source in results.iter().filter_map(|r| r.chunk.source()) {
            if top_sources.len() == TOP_SOURCES {
                break;
            }
            if !top_sources.iter().any(|s| s == source) {
                top_sources.push(source.to_string());
            }
        }

        Self {
            retrieved: results.len(),
            average_score,
            top_sources,
            response_generated: ctx.bool("response_generated").unwrap_or(false),
        }
    }
}

fn count(ctx: &RunContext, key: &str) -> usize {
    ctx.integer(key)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chunk, Document, Metadata, RetrievedChunk};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(content: &str, modality: Modality, source: &str) -> Document {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), json!(source));
        Document::with_modality(content, modality, metadata)
    }

    fn hit(source: &str, score: f32, rank: usize) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk::whole(&doc(&format!("from {source} {rank}"), Modality::Text, source)),
            score,
            rank,
        }
    }

    #[test]
    fn test_indexing_summary() {
        let ctx = RunContext::new()
            .with(
                "documents",
                vec![
                    doc("a", Modality::Text, "a.txt"),
                    doc("b", Modality::Text, "b.txt"),
                    doc("[IMAGE] c.png", Modality::Mixed, "c.png"),
                    doc("[IMAGE] d.png", Modality::Image, "d.png"),
                ],
            )
            .with("chunk_count", 6_usize)
            .with("chunks_indexed", 6_usize)
            .with("vectorstore_info", json!({"chunk_count": 10}));

        let summary = IndexingSummary::from_context(&ctx);

        assert_eq!(summary.documents_loaded, 4);
        assert_eq!(summary.chunks_created, 6);
        assert_eq!(summary.chunks_indexed, 6);
        assert_eq!(summary.store_total, 10);
        assert_eq!(summary.multimodal_documents, 2);
        assert!((summary.multimodal_share - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_indexing_summary_of_empty_context() {
        assert_eq!(IndexingSummary::from_context(&RunContext::new()), IndexingSummary::default());
    }

    #[test]
    fn test_query_summary_dedups_sources() {
        let ctx = RunContext::new()
            .with(
                "documents",
                vec![
                    hit("a.txt", 0.9, 0),
                    hit("a.txt", 0.7, 1),
                    hit("b.txt", 0.5, 2),
                    hit("c.txt", 0.3, 3),
                    hit("d.txt", 0.1, 4),
                ],
            )
            .with("response_generated", true);

        let summary = QuerySummary::from_context(&ctx);

        assert_eq!(summary.retrieved, 5);
        assert_eq!(summary.top_sources, vec!["a.txt", "b.txt", "c.txt"]);
        assert!((summary.average_score.unwrap() - 0.5).abs() < 1e-6);
        assert!(summary.response_generated);
    }

    #[test]
    fn test_query_summary_without_results() {
        let summary = QuerySummary::from_context(&RunContext::new().with("documents", Vec::<RetrievedChunk>::new()));
        assert_eq!(summary.retrieved, 0);
        assert_eq!(summary.average_score, None);
    }
}
