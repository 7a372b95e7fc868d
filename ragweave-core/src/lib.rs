//! # ragweave-core — Hybrid Retrieval Engine
//!
//! Chunking, BM25 keyword indexing, embedding/vector-store contracts, and
//! rerankers, composed into a [`HybridRetrievalEngine`] that blends semantic
//! and lexical search with mandatory result deduplication.

pub mod bm25;
pub mod chunker;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod rerank;
pub mod tokenize;
pub mod types;
pub mod vector_store;

pub use chunker::{Chunker, HeadingAwareChunker, TokenWindowChunker};
pub use embeddings::{EmbeddingProvider, HashEmbedder, cosine_similarity};
pub use engine::{EngineBuilder, EngineConfig, HybridRetrievalEngine};
pub use error::{RetrievalError, Result};
pub use rerank::{CosineReranker, MmrReranker, RankCandidate, Reranker};
pub use types::{Chunk, Document, RetrievalResult};
pub use vector_store::{InMemoryVectorStore, Neighbor, StoredEmbedding, VectorStore};
