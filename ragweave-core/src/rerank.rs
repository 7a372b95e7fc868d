//! Reranking strategies for vector-search candidates.
//!
//! Two interchangeable strategies: plain cosine similarity, and Maximal
//! Marginal Relevance (MMR), which trades relevance against redundancy with
//! already-selected results.

use crate::embeddings::cosine_similarity;
use crate::types::Chunk;
use async_trait::async_trait;

/// A candidate entering the reranking stage.
#[derive(Debug, Clone)]
pub struct RankCandidate {
    pub chunk: Chunk,
    pub vector: Option<Vec<f32>>,
    pub score: f32,
}

impl RankCandidate {
    /// Similarity to the query vector, falling back to the candidate's
    /// pre-existing score when vectors are absent or dimensions mismatch.
    fn relevance(&self, query_vector: &[f32]) -> f32 {
        match &self.vector {
            Some(v) if v.len() == query_vector.len() && !v.is_empty() => {
                cosine_similarity(query_vector, v)
            }
            _ => self.score,
        }
    }
}

/// Reorders candidates against a query vector.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rank(
        &self,
        query_vector: &[f32],
        candidates: Vec<RankCandidate>,
        limit: usize,
    ) -> Vec<RankCandidate>;
}

/// Ranks by cosine similarity to the query vector.
#[derive(Debug, Clone, Default)]
pub struct CosineReranker;

#[async_trait]
impl Reranker for CosineReranker {
    async fn rank(
        &self,
        query_vector: &[f32],
        mut candidates: Vec<RankCandidate>,
        limit: usize,
    ) -> Vec<RankCandidate> {
        for candidate in &mut candidates {
            candidate.score = candidate.relevance(query_vector);
        }
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);
        candidates
    }
}

/// Maximal Marginal Relevance reranker.
///
/// Greedily selects the candidate maximizing
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`,
/// so no two selected items are near-duplicates even when their raw
/// relevance scores are close.
#[derive(Debug, Clone)]
pub struct MmrReranker {
    pub lambda: f32,
}

impl Default for MmrReranker {
    fn default() -> Self {
        Self { lambda: 0.7 }
    }
}

impl MmrReranker {
    pub fn new(lambda: f32) -> Self {
        Self { lambda }
    }
}

#[async_trait]
impl Reranker for MmrReranker {
    async fn rank(
        &self,
        query_vector: &[f32],
        candidates: Vec<RankCandidate>,
        limit: usize,
    ) -> Vec<RankCandidate> {
        let mut remaining: Vec<(f32, RankCandidate)> = candidates
            .into_iter()
            .map(|c| (c.relevance(query_vector), c))
            .collect();
        let mut selected: Vec<RankCandidate> = Vec::new();

        while selected.len() < limit && !remaining.is_empty() {
            let mut best_idx = 0;
            let mut best_score = f32::NEG_INFINITY;
            for (i, (relevance, candidate)) in remaining.iter().enumerate() {
                let redundancy = max_similarity(candidate, &selected);
                let mmr = self.lambda * relevance - (1.0 - self.lambda) * redundancy;
                if mmr > best_score {
                    best_score = mmr;
                    best_idx = i;
                }
            }
            let (relevance, mut candidate) = remaining.swap_remove(best_idx);
            candidate.score = relevance;
            selected.push(candidate);
        }
        selected
    }
}

/// Maximum pairwise cosine similarity between a candidate and the
/// already-selected set, considering only same-dimension vectors.
fn max_similarity(candidate: &RankCandidate, selected: &[RankCandidate]) -> f32 {
    let Some(vector) = &candidate.vector else {
        return 0.0;
    };
    selected
        .iter()
        .filter_map(|s| s.vector.as_ref())
        .filter(|v| v.len() == vector.len())
        .map(|v| cosine_similarity(vector, v))
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn candidate(id: &str, vector: Option<Vec<f32>>, score: f32) -> RankCandidate {
        RankCandidate {
            chunk: Chunk {
                id: id.to_string(),
                document_id: "d1".into(),
                content: id.to_string(),
                section: String::new(),
                ordinal: 0,
                token_count: 1,
                metadata: HashMap::new(),
            },
            vector,
            score,
        }
    }

    #[tokio::test]
    async fn test_cosine_sorts_descending() {
        let reranker = CosineReranker;
        let ranked = reranker
            .rank(
                &[1.0, 0.0],
                vec![
                    candidate("far", Some(vec![0.0, 1.0]), 0.0),
                    candidate("near", Some(vec![1.0, 0.1]), 0.0),
                ],
                10,
            )
            .await;
        assert_eq!(ranked[0].chunk.id, "near");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[tokio::test]
    async fn test_cosine_falls_back_to_existing_score() {
        let reranker = CosineReranker;
        let ranked = reranker
            .rank(
                &[1.0, 0.0],
                vec![
                    candidate("mismatched", Some(vec![1.0, 0.0, 0.0]), 0.9),
                    candidate("vectorless", None, 0.4),
                ],
                10,
            )
            .await;
        assert_eq!(ranked[0].chunk.id, "mismatched");
        assert_eq!(ranked[0].score, 0.9);
        assert_eq!(ranked[1].score, 0.4);
    }

    #[tokio::test]
    async fn test_mmr_returns_all_without_duplicates() {
        let reranker = MmrReranker::default();
        let ranked = reranker
            .rank(
                &[1.0, 0.0],
                vec![
                    candidate("a", Some(vec![1.0, 0.0]), 0.0),
                    candidate("b", Some(vec![0.9, 0.1]), 0.0),
                    candidate("c", Some(vec![0.0, 1.0]), 0.0),
                ],
                10,
            )
            .await;
        assert_eq!(ranked.len(), 3);
        let mut ids: Vec<&str> = ranked.iter().map(|c| c.chunk.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_mmr_demotes_redundant_candidate() {
        // "echo" nearly duplicates "best"; the dissimilar "other" should be
        // picked before it despite lower raw relevance.
        let reranker = MmrReranker::new(0.5);
        let ranked = reranker
            .rank(
                &[1.0, 0.0],
                vec![
                    candidate("best", Some(vec![0.9, 0.44]), 0.0),
                    candidate("echo", Some(vec![0.9, 0.45]), 0.0),
                    candidate("other", Some(vec![0.7, -0.7]), 0.0),
                ],
                3,
            )
            .await;
        assert_eq!(ranked[0].chunk.id, "best");
        assert_eq!(ranked[1].chunk.id, "other");
        assert_eq!(ranked[2].chunk.id, "echo");
    }

    #[tokio::test]
    async fn test_mmr_respects_limit() {
        let reranker = MmrReranker::default();
        let ranked = reranker
            .rank(
                &[1.0, 0.0],
                vec![
                    candidate("a", Some(vec![1.0, 0.0]), 0.0),
                    candidate("b", Some(vec![0.5, 0.5]), 0.0),
                    candidate("c", Some(vec![0.0, 1.0]), 0.0),
                ],
                2,
            )
            .await;
        assert_eq!(ranked.len(), 2);
    }
}
