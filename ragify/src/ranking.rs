//! Similarity scoring and top-k ranking.
//!
//! Ranking is a pure function of the query vector, the candidate vectors and
//! the metric. Ties are broken by candidate insertion order so the same
//! inputs always produce the same ordering.

use crate::core::EmbeddingVector;
use crate::errors::IncomparableEmbeddingError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// How two embeddings are compared. Higher scores mean more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Cosine similarity in `[-1, 1]`. Zero vectors score 0.
    #[default]
    Cosine,
    /// Raw dot product.
    InnerProduct,
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::InnerProduct => write!(f, "inner_product"),
        }
    }
}

impl FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "inner_product" | "dot" => Ok(Self::InnerProduct),
            other => Err(format!("unknown similarity metric '{other}'")),
        }
    }
}

impl SimilarityMetric {
    /// Scores two vectors. Callers must check comparability first.
    #[must_use]
    pub fn score(&self, a: &EmbeddingVector, b: &EmbeddingVector) -> f32 {
        self.score_slices(a.values(), b.values())
    }

    /// Scores two raw slices of equal length.
    #[must_use]
    pub fn score_slices(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        match self {
            Self::InnerProduct => dot,
            Self::Cosine => {
                let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if na == 0.0 || nb == 0.0 {
                    0.0
                } else {
                    dot / (na * nb)
                }
            }
        }
    }
}

/// A candidate for ranking.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a, T> {
    /// Insertion sequence number, used as the tie-breaker.
    pub seq: u64,
    /// The candidate's embedding.
    pub embedding: &'a EmbeddingVector,
    /// The payload returned with the score.
    pub item: T,
}

/// A ranked candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    /// The payload.
    pub item: T,
    /// The similarity score.
    pub score: f32,
    /// The candidate's insertion sequence number.
    pub seq: u64,
}

/// Returns the `k` candidates most similar to `query`, best first.
///
/// Scores are compared descending; equal scores keep ascending `seq` order.
/// NaN scores sort last. Fails if any candidate is not comparable with the
/// query.
pub fn rank<'a, T, I>(
    query: &EmbeddingVector,
    candidates: I,
    metric: SimilarityMetric,
    k: usize,
) -> Result<Vec<Ranked<T>>, IncomparableEmbeddingError>
where
    I: IntoIterator<Item = Candidate<'a, T>>,
{
    let mut scored = Vec::new();
    for candidate in candidates {
        if !query.is_comparable(candidate.embedding) {
            return Err(IncomparableEmbeddingError {
                query_model: query.model().to_string(),
                query_dimensions: query.dimensions(),
                candidate_model: candidate.embedding.model().to_string(),
                candidate_dimensions: candidate.embedding.dimensions(),
            });
        }
        scored.push(Ranked {
            score: metric.score(query, candidate.embedding),
            seq: candidate.seq,
            item: candidate.item,
        });
    }

    scored.sort_by(|a, b| compare_scores(a.score, b.score).then(a.seq.cmp(&b.seq)));
    scored.truncate(k);
    Ok(scored)
}

fn compare_scores(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f32]) -> EmbeddingVector {
        EmbeddingVector::new("m", values.to_vec())
    }

    #[test]
    fn test_cosine_and_inner_product() {
        let a = v(&[1.0, 0.0]);
        let b = v(&[2.0, 0.0]);
        assert!((SimilarityMetric::Cosine.score(&a, &b) - 1.0).abs() < 1e-6);
        assert!((SimilarityMetric::InnerProduct.score(&a, &b) - 2.0).abs() < 1e-6);
        assert_eq!(SimilarityMetric::Cosine.score(&a, &v(&[0.0, 0.0])), 0.0);
    }

    #[test]
    fn test_rank_orders_by_score() {
        let query = v(&[1.0, 0.0]);
        let embeddings = [v(&[0.0, 1.0]), v(&[1.0, 0.1]), v(&[1.0, 1.0])];
        let candidates = embeddings.iter().enumerate().map(|(i, e)| Candidate {
            seq: i as u64,
            embedding: e,
            item: i,
        });

        let ranked = rank(&query, candidates, SimilarityMetric::Cosine, 2).unwrap();
        assert_eq!(ranked.iter().map(|r| r.item).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let query = v(&[1.0, 0.0]);
        let same = v(&[1.0, 0.0]);
        let candidates = [5u64, 2, 9].into_iter().map(|seq| Candidate {
            seq,
            embedding: &same,
            item: seq,
        });

        let ranked = rank(&query, candidates, SimilarityMetric::Cosine, 10).unwrap();
        assert_eq!(ranked.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![2, 5, 9]);
    }

    #[test]
    fn test_k_larger_than_candidates() {
        let query = v(&[1.0]);
        let only = v(&[1.0]);
        let ranked = rank(
            &query,
            [Candidate { seq: 0, embedding: &only, item: () }],
            SimilarityMetric::InnerProduct,
            4,
        )
        .unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_incomparable_models_rejected() {
        let query = v(&[1.0, 0.0]);
        let other = EmbeddingVector::new("other", vec![1.0, 0.0]);
        let err = rank(
            &query,
            [Candidate { seq: 0, embedding: &other, item: () }],
            SimilarityMetric::Cosine,
            1,
        )
        .unwrap_err();
        assert_eq!(err.candidate_model, "other");
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("cosine".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::Cosine);
        assert_eq!("dot".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::InnerProduct);
        assert!("l2".parse::<SimilarityMetric>().is_err());
    }
}
