//! # Hybrid Retrieval Engine
//!
//! Composes a chunker, an embedding provider, a vector store, the BM25
//! keyword index, and a reranker into one retrieval surface. Vector search
//! provides the primary candidates; the keyword index backfills when the
//! vector side comes up short.
//!
//! Document and chunk snapshots are cached under a read/write lock together
//! with the keyword index: searches and lookups take a shared hold while
//! indexing takes an exclusive one, so concurrent searches never block each
//! other but never overlap with an index rebuild.

use crate::bm25::Bm25Index;
use crate::chunker::{Chunker, TokenWindowChunker};
use crate::embeddings::EmbeddingProvider;
use crate::error::{RetrievalError, Result};
use crate::rerank::{CosineReranker, RankCandidate, Reranker};
use crate::types::{Chunk, Document, META_RETRIEVAL, RETRIEVAL_KEYWORD, RetrievalResult};
use crate::vector_store::VectorStore;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the hybrid retrieval engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Nearest-neighbor candidates fetched from the vector store.
    pub vector_top_k: usize,
    /// Candidates kept after reranking.
    pub rerank_top_k: usize,
    /// Target result count for hybrid fill; falls back to `rerank_top_k`.
    pub hybrid_top_k: Option<usize>,
    /// Results scoring below this are dropped.
    pub min_search_score: f32,
    /// Multiplier applied to heading chunks so they rank below body text.
    /// Must lie in (0, 1].
    pub title_penalty: f32,
    /// Whether keyword fallback is enabled.
    pub hybrid: bool,
    /// Character budget for synthetic keyword-result snippets.
    pub keyword_snippet_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vector_top_k: 12,
            rerank_top_k: 5,
            hybrid_top_k: None,
            min_search_score: 0.0,
            title_penalty: 0.6,
            hybrid: true,
            keyword_snippet_chars: 400,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration, failing fast on out-of-range knobs.
    pub fn validate(&self) -> Result<()> {
        if self.vector_top_k == 0 {
            return Err(RetrievalError::Config {
                message: "vector_top_k must be nonzero".into(),
            });
        }
        if self.rerank_top_k == 0 {
            return Err(RetrievalError::Config {
                message: "rerank_top_k must be nonzero".into(),
            });
        }
        if !(self.title_penalty > 0.0 && self.title_penalty <= 1.0) {
            return Err(RetrievalError::Config {
                message: format!("title_penalty must be in (0, 1], got {}", self.title_penalty),
            });
        }
        if self.keyword_snippet_chars == 0 {
            return Err(RetrievalError::Config {
                message: "keyword_snippet_chars must be nonzero".into(),
            });
        }
        Ok(())
    }

    fn hybrid_target(&self) -> usize {
        self.hybrid_top_k.unwrap_or(self.rerank_top_k)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EngineState {
    documents: HashMap<String, Document>,
    chunks: HashMap<String, Chunk>,
    keyword_index: Bm25Index,
}

/// Hybrid retrieval engine combining vector search with BM25 fallback.
pub struct HybridRetrievalEngine {
    config: EngineConfig,
    chunker: Box<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    reranker: Box<dyn Reranker>,
    state: RwLock<EngineState>,
}

impl std::fmt::Debug for HybridRetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("engine lock poisoned");
        f.debug_struct("HybridRetrievalEngine")
            .field("config", &self.config)
            .field("documents", &state.documents.len())
            .field("chunks", &state.chunks.len())
            .finish()
    }
}

/// Builder for [`HybridRetrievalEngine`]. The embedder and vector store are
/// required; the chunker defaults to [`TokenWindowChunker`] and the reranker
/// to [`CosineReranker`].
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    chunker: Option<Box<dyn Chunker>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    reranker: Option<Box<dyn Reranker>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn reranker(mut self, reranker: Box<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn build(self) -> Result<HybridRetrievalEngine> {
        self.config.validate()?;
        let embedder = self.embedder.ok_or_else(|| RetrievalError::Config {
            message: "an embedding provider is required".into(),
        })?;
        let vector_store = self.vector_store.ok_or_else(|| RetrievalError::Config {
            message: "a vector store is required".into(),
        })?;
        Ok(HybridRetrievalEngine {
            config: self.config,
            chunker: self
                .chunker
                .unwrap_or_else(|| Box::new(TokenWindowChunker::default())),
            embedder,
            vector_store,
            reranker: self.reranker.unwrap_or_else(|| Box::new(CosineReranker)),
            state: RwLock::new(EngineState::default()),
        })
    }
}

impl HybridRetrievalEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Chunk, embed, and index documents for both retrieval paths.
    ///
    /// Documents without an ID are assigned a stable one derived from
    /// source + content.
    pub async fn index_documents(&self, documents: Vec<Document>) -> Result<()> {
        for mut document in documents {
            document.ensure_id();
            let chunks = self.chunker.chunk(&document)?;

            let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| RetrievalError::Embedding {
                    message: e.to_string(),
                })?;
            for (chunk, vector) in chunks.iter().zip(vectors) {
                self.vector_store
                    .add_embedding(&chunk.id, vector, &chunk.content)
                    .await?;
            }

            let mut state = self.state.write().expect("engine lock poisoned");
            for chunk in &chunks {
                state.keyword_index.add(&chunk.id, &chunk.content);
                state.chunks.insert(chunk.id.clone(), chunk.clone());
            }
            tracing::debug!(
                document_id = %document.id,
                chunks = chunks.len(),
                "Indexed document"
            );
            state.documents.insert(document.id.clone(), document);
        }
        Ok(())
    }

    /// Run a hybrid search for `query`.
    ///
    /// Vector candidates are reranked and score-adjusted; when hybrid mode
    /// is on and results fall short of the target, keyword hits backfill the
    /// list. A chunk ID never appears twice in the result, whichever path
    /// produced it.
    pub async fn search(&self, query: &str) -> Result<Vec<RetrievalResult>> {
        let query_vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| RetrievalError::Embedding {
                message: e.to_string(),
            })?;
        let neighbors = self
            .vector_store
            .search(&query_vector, self.config.vector_top_k)
            .await?;

        let candidates: Vec<RankCandidate> = {
            let state = self.state.read().expect("engine lock poisoned");
            neighbors
                .into_iter()
                .filter_map(|n| {
                    state.chunks.get(&n.id).map(|chunk| RankCandidate {
                        chunk: chunk.clone(),
                        vector: Some(n.vector),
                        score: n.score,
                    })
                })
                .collect()
        };

        let ranked = self
            .reranker
            .rank(&query_vector, candidates, self.config.rerank_top_k)
            .await;

        let mut results: Vec<RetrievalResult> = ranked
            .into_iter()
            .map(|candidate| {
                let mut score = candidate.score;
                if candidate.chunk.is_title() {
                    score *= self.config.title_penalty;
                }
                RetrievalResult {
                    chunk: candidate.chunk,
                    score,
                }
            })
            .filter(|r| r.score >= self.config.min_search_score)
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let target = self.config.hybrid_target();
        if self.config.hybrid && results.len() < target {
            self.fill_from_keyword_index(query, target, &mut results);
        }

        tracing::debug!(query, results = results.len(), "Hybrid search complete");
        Ok(results)
    }

    /// Append non-duplicate keyword hits until `target` results exist.
    fn fill_from_keyword_index(
        &self,
        query: &str,
        target: usize,
        results: &mut Vec<RetrievalResult>,
    ) {
        let mut seen: HashSet<String> = results.iter().map(|r| r.chunk.id.clone()).collect();

        let state = self.state.read().expect("engine lock poisoned");
        for hit in state.keyword_index.search(query, target) {
            if results.len() >= target {
                break;
            }
            if !seen.insert(hit.chunk_id.clone()) {
                continue;
            }
            let Some(chunk) = state.chunks.get(&hit.chunk_id) else {
                continue;
            };
            let mut keyword_chunk = chunk.clone();
            keyword_chunk.content = truncate_chars(&chunk.content, self.config.keyword_snippet_chars);
            keyword_chunk
                .metadata
                .insert(META_RETRIEVAL.to_string(), RETRIEVAL_KEYWORD.to_string());
            results.push(RetrievalResult {
                chunk: keyword_chunk,
                score: hit.score,
            });
        }
    }

    /// Look up an indexed document by ID.
    pub fn document(&self, id: &str) -> Option<Document> {
        let state = self.state.read().expect("engine lock poisoned");
        state.documents.get(id).cloned()
    }

    /// Number of indexed documents.
    pub fn count(&self) -> usize {
        let state = self.state.read().expect("engine lock poisoned");
        state.documents.len()
    }

    /// Number of indexed chunks.
    pub fn chunk_count(&self) -> usize {
        let state = self.state.read().expect("engine lock poisoned");
        state.chunks.len()
    }

    /// Drop all indexed documents, chunks, keyword postings, and embeddings.
    pub async fn clear(&self) -> Result<()> {
        {
            let mut state = self.state.write().expect("engine lock poisoned");
            state.documents.clear();
            state.chunks.clear();
            state.keyword_index.clear();
        }
        self.vector_store.clear().await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Truncate on a character boundary within `max_chars`.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::HeadingAwareChunker;
    use crate::embeddings::HashEmbedder;
    use crate::rerank::MmrReranker;
    use crate::types::META_SECTION;
    use crate::vector_store::InMemoryVectorStore;
    use pretty_assertions::assert_eq;

    fn engine_with(config: EngineConfig) -> HybridRetrievalEngine {
        HybridRetrievalEngine::builder()
            .config(config)
            .embedder(Arc::new(HashEmbedder::new(64)))
            .vector_store(Arc::new(InMemoryVectorStore::new()))
            .build()
            .unwrap()
    }

    fn policy_docs() -> Vec<Document> {
        vec![
            Document::new(
                "shipping-policy",
                "Shipping Policy",
                "Shipping Policy: standard orders ship in 2 days via ground courier.",
                "policies/shipping.md",
            ),
            Document::new(
                "return-policy",
                "Return Policy",
                "Return Policy: items may be returned within 30 days of delivery.",
                "policies/returns.md",
            ),
        ]
    }

    // -- Construction -------------------------------------------------------

    #[test]
    fn test_build_requires_embedder_and_store() {
        let missing_embedder = HybridRetrievalEngine::builder()
            .vector_store(Arc::new(InMemoryVectorStore::new()))
            .build();
        assert!(matches!(
            missing_embedder,
            Err(RetrievalError::Config { .. })
        ));

        let missing_store = HybridRetrievalEngine::builder()
            .embedder(Arc::new(HashEmbedder::new(16)))
            .build();
        assert!(matches!(missing_store, Err(RetrievalError::Config { .. })));
    }

    #[test]
    fn test_build_rejects_out_of_range_title_penalty() {
        for bad in [0.0, -0.5, 1.5] {
            let result = HybridRetrievalEngine::builder()
                .config(EngineConfig {
                    title_penalty: bad,
                    ..EngineConfig::default()
                })
                .embedder(Arc::new(HashEmbedder::new(16)))
                .vector_store(Arc::new(InMemoryVectorStore::new()))
                .build();
            assert!(matches!(result, Err(RetrievalError::Config { .. })));
        }
    }

    // -- Indexing & lookup --------------------------------------------------

    #[tokio::test]
    async fn test_index_and_document_lookup() {
        let engine = engine_with(EngineConfig::default());
        engine.index_documents(policy_docs()).await.unwrap();
        assert_eq!(engine.count(), 2);
        assert!(engine.chunk_count() >= 2);

        let doc = engine.document("shipping-policy").unwrap();
        assert_eq!(doc.title, "Shipping Policy");
        assert!(engine.document("missing").is_none());
    }

    #[tokio::test]
    async fn test_index_assigns_missing_ids() {
        let engine = engine_with(EngineConfig::default());
        let doc = Document::new("", "Untitled", "some content here", "notes.txt");
        engine.index_documents(vec![doc]).await.unwrap();
        assert_eq!(engine.count(), 1);
    }

    #[tokio::test]
    async fn test_reindexing_same_documents_keeps_keyword_scores_positive() {
        // Forcing the min-score filter above every cosine score routes all
        // results through the keyword index, which must stay consistent
        // when the same documents are indexed twice.
        let engine = engine_with(EngineConfig {
            min_search_score: 10.0,
            ..EngineConfig::default()
        });
        engine.index_documents(policy_docs()).await.unwrap();
        engine.index_documents(policy_docs()).await.unwrap();
        assert_eq!(engine.count(), 2);

        let results = engine.search("shipping").await.unwrap();
        assert!(!results.is_empty());
        for result in &results {
            assert!(result.score > 0.0);
        }
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let engine = engine_with(EngineConfig::default());
        engine.index_documents(policy_docs()).await.unwrap();
        engine.clear().await.unwrap();
        assert_eq!(engine.count(), 0);
        assert_eq!(engine.chunk_count(), 0);
        assert!(engine.search("shipping").await.unwrap().is_empty());
    }

    // -- Search -------------------------------------------------------------

    #[tokio::test]
    async fn test_empty_engine_search_is_empty() {
        let engine = engine_with(EngineConfig::default());
        assert!(engine.search("anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_finds_relevant_document() {
        let engine = engine_with(EngineConfig::default());
        engine.index_documents(policy_docs()).await.unwrap();

        let results = engine.search("shipping timeline").await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].chunk.document_id, "shipping-policy");
    }

    #[tokio::test]
    async fn test_no_duplicate_chunk_ids_in_results() {
        let engine = engine_with(EngineConfig {
            hybrid_top_k: Some(10),
            ..EngineConfig::default()
        });
        engine.index_documents(policy_docs()).await.unwrap();

        let results = engine.search("policy days").await.unwrap();
        let mut ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[tokio::test]
    async fn test_min_score_filter_routes_to_keyword_fallback() {
        // With the threshold above any cosine score, every surviving result
        // must come from the keyword index.
        let engine = engine_with(EngineConfig {
            min_search_score: 10.0,
            ..EngineConfig::default()
        });
        engine.index_documents(policy_docs()).await.unwrap();

        let results = engine.search("shipping").await.unwrap();
        assert!(!results.is_empty());
        for result in &results {
            assert_eq!(
                result.chunk.metadata.get(META_RETRIEVAL).map(String::as_str),
                Some(RETRIEVAL_KEYWORD)
            );
        }
    }

    #[tokio::test]
    async fn test_hybrid_disabled_suppresses_fallback() {
        let engine = engine_with(EngineConfig {
            min_search_score: 10.0,
            hybrid: false,
            ..EngineConfig::default()
        });
        engine.index_documents(policy_docs()).await.unwrap();
        assert!(engine.search("shipping").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keyword_snippets_respect_char_budget() {
        let engine = engine_with(EngineConfig {
            min_search_score: 10.0,
            keyword_snippet_chars: 20,
            ..EngineConfig::default()
        });
        engine.index_documents(policy_docs()).await.unwrap();

        let results = engine.search("shipping").await.unwrap();
        assert!(!results.is_empty());
        for result in &results {
            assert!(result.chunk.content.chars().count() <= 20);
        }
    }

    #[tokio::test]
    async fn test_title_chunks_rank_below_body() {
        let engine = HybridRetrievalEngine::builder()
            .config(EngineConfig {
                title_penalty: 0.1,
                hybrid: false,
                min_search_score: f32::MIN,
                ..EngineConfig::default()
            })
            .chunker(Box::new(HeadingAwareChunker::new(64, 8, 0).unwrap()))
            .embedder(Arc::new(HashEmbedder::new(64)))
            .vector_store(Arc::new(InMemoryVectorStore::new()))
            .build()
            .unwrap();
        let doc = Document::new(
            "d1",
            "Doc",
            "# Shipping schedule details\n\nShipping schedule details: orders ship in two days.",
            "doc.md",
        );
        engine.index_documents(vec![doc]).await.unwrap();

        let results = engine.search("shipping schedule details").await.unwrap();
        assert!(results.len() >= 2);
        let body_pos = results
            .iter()
            .position(|r| r.chunk.metadata.get(META_SECTION).map(String::as_str) == Some("body"))
            .unwrap();
        let title_pos = results
            .iter()
            .position(|r| r.chunk.metadata.get(META_SECTION).map(String::as_str) == Some("title"))
            .unwrap();
        assert!(body_pos < title_pos);
    }

    #[tokio::test]
    async fn test_mmr_reranker_is_pluggable() {
        let engine = HybridRetrievalEngine::builder()
            .reranker(Box::new(MmrReranker::default()))
            .embedder(Arc::new(HashEmbedder::new(64)))
            .vector_store(Arc::new(InMemoryVectorStore::new()))
            .build()
            .unwrap();
        engine.index_documents(policy_docs()).await.unwrap();
        let results = engine.search("shipping timeline").await.unwrap();
        assert!(!results.is_empty());
    }
}
