//! In-memory BM25 keyword index.
//!
//! An inverted index over chunk text, independent of the vector side of the
//! engine. Scoring uses the standard BM25 formula with `k1 = 1.6` and
//! `b = 0.75`.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

const K1: f32 = 1.6;
const B: f32 = 0.75;

fn term_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-z0-9]+").expect("term pattern is valid"))
}

/// Lower-cased word/number runs used as index terms.
fn terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    term_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A ranked keyword hit.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub chunk_id: String,
    pub score: f32,
}

/// In-memory inverted index with BM25 ranking.
#[derive(Debug, Default)]
pub struct Bm25Index {
    /// term -> chunk_id -> term frequency
    postings: HashMap<String, HashMap<String, usize>>,
    /// term -> number of chunks containing it
    doc_freq: HashMap<String, usize>,
    /// chunk_id -> term count
    lengths: HashMap<String, usize>,
    total_length: usize,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index one chunk's text under its ID. O(distinct terms in the chunk).
    ///
    /// Re-adding an existing ID is an upsert: the previous postings and
    /// statistics for that chunk are removed first, so document frequencies
    /// never drift past the chunk count.
    pub fn add(&mut self, chunk_id: &str, text: &str) {
        if self.lengths.contains_key(chunk_id) {
            self.remove(chunk_id);
        }

        let tokens = terms(text);
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for token in &tokens {
            *tf.entry(token.as_str()).or_insert(0) += 1;
        }

        for (term, count) in tf {
            self.postings
                .entry(term.to_string())
                .or_default()
                .insert(chunk_id.to_string(), count);
            *self.doc_freq.entry(term.to_string()).or_insert(0) += 1;
        }
        self.lengths.insert(chunk_id.to_string(), tokens.len());
        self.total_length += tokens.len();
    }

    /// Drop one chunk's postings and statistics.
    fn remove(&mut self, chunk_id: &str) {
        let Some(length) = self.lengths.remove(chunk_id) else {
            return;
        };
        self.total_length -= length;

        let doc_freq = &mut self.doc_freq;
        self.postings.retain(|term, chunks| {
            if chunks.remove(chunk_id).is_some() {
                if let Some(df) = doc_freq.get_mut(term) {
                    *df = df.saturating_sub(1);
                }
            }
            !chunks.is_empty()
        });
        doc_freq.retain(|_, df| *df > 0);
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Drop all postings and statistics.
    pub fn clear(&mut self) {
        self.postings.clear();
        self.doc_freq.clear();
        self.lengths.clear();
        self.total_length = 0;
    }

    /// Rank chunks for a query. Returns an empty list (never an error) when
    /// the index is empty or no query term appears in it.
    pub fn search(&self, query: &str, limit: usize) -> Vec<KeywordHit> {
        if self.is_empty() || limit == 0 {
            return Vec::new();
        }

        let n = self.lengths.len() as f32;
        let avg_len = self.total_length as f32 / n;

        let mut unique_terms: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for term in terms(query) {
            if seen.insert(term.clone()) {
                unique_terms.push(term);
            }
        }

        let mut scores: HashMap<&str, f32> = HashMap::new();
        for term in &unique_terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = *self.doc_freq.get(term).unwrap_or(&0) as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (chunk_id, tf) in postings {
                let tf = *tf as f32;
                let doc_len = *self.lengths.get(chunk_id).unwrap_or(&0) as f32;
                let norm = K1 * (1.0 - B + B * (doc_len / avg_len));
                let contribution = idf * (tf * (K1 + 1.0)) / (tf + norm);
                *scores.entry(chunk_id.as_str()).or_insert(0.0) += contribution;
            }
        }

        let mut hits: Vec<KeywordHit> = scores
            .into_iter()
            .map(|(chunk_id, score)| KeywordHit {
                chunk_id: chunk_id.to_string(),
                score,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(limit);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_index() -> Bm25Index {
        let mut index = Bm25Index::new();
        index.add("c1", "Shipping policy: orders ship within two business days");
        index.add("c2", "Return policy: items may be returned within thirty days");
        index.add("c3", "Our warehouse processes shipping labels every morning");
        index
    }

    #[test]
    fn test_empty_index_returns_empty() {
        let index = Bm25Index::new();
        assert!(index.search("anything at all", 10).is_empty());
    }

    #[test]
    fn test_unmatched_terms_return_empty() {
        let index = sample_index();
        assert!(index.search("quantum chromodynamics", 10).is_empty());
    }

    #[test]
    fn test_relevant_chunk_ranks_first() {
        let index = sample_index();
        let hits = index.search("shipping timeline", 10);
        assert!(!hits.is_empty());
        assert!(hits[0].chunk_id == "c1" || hits[0].chunk_id == "c3");
        assert!(hits.iter().all(|h| h.chunk_id != "c2"));
    }

    #[test]
    fn test_scores_strictly_decreasing() {
        // c1 matches three query terms, c2 two, c3 one, so every adjacent
        // pair differs by at least one positive contribution.
        let index = sample_index();
        let hits = index.search("shipping policy days", 10);
        assert!(hits.len() >= 2);
        for pair in hits.windows(2) {
            assert!(pair[0].score > pair[1].score);
        }
    }

    #[test]
    fn test_query_terms_deduplicated() {
        let index = sample_index();
        let once = index.search("shipping", 10);
        let twice = index.search("shipping shipping shipping", 10);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.chunk_id, b.chunk_id);
            assert!((a.score - b.score).abs() < 1e-6);
        }
    }

    #[test]
    fn test_limit_truncates() {
        let index = sample_index();
        let hits = index.search("policy shipping days", 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_case_insensitive_terms() {
        let index = sample_index();
        let lower = index.search("shipping", 10);
        let upper = index.search("SHIPPING", 10);
        assert_eq!(lower.len(), upper.len());
    }

    #[test]
    fn test_clear_resets_index() {
        let mut index = sample_index();
        assert_eq!(index.len(), 3);
        index.clear();
        assert!(index.is_empty());
        assert!(index.search("shipping", 10).is_empty());
    }

    #[test]
    fn test_readd_same_chunk_is_an_upsert() {
        let mut index = Bm25Index::new();
        index.add("c1", "shipping policy for standard orders");
        index.add("c2", "return policy for damaged items");
        index.add("c1", "shipping policy for standard orders");

        assert_eq!(index.len(), 2);
        let hits = index.search("shipping", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "c1");
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn test_readd_with_new_text_replaces_postings() {
        let mut index = Bm25Index::new();
        index.add("c1", "shipping details for couriers");
        index.add("c1", "refund details for couriers");

        assert_eq!(index.len(), 1);
        assert!(index.search("shipping", 10).is_empty());
        let hits = index.search("refund", 10);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn test_rare_term_outweighs_common() {
        let mut index = Bm25Index::new();
        index.add("common1", "alpha beta");
        index.add("common2", "alpha gamma");
        index.add("rare", "alpha delta");
        // "delta" appears only in one chunk, so it dominates for that chunk.
        let hits = index.search("delta", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "rare");
    }
}
