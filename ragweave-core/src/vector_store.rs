//! Vector store contract and an in-memory reference implementation.

use crate::embeddings::cosine_similarity;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// An embedding stored under a chunk ID.
#[derive(Debug, Clone)]
pub struct StoredEmbedding {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
}

/// A nearest-neighbor hit from the store.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub score: f32,
}

/// Persistence contract for chunk embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add_embedding(&self, id: &str, vector: Vec<f32>, text: &str) -> Result<()>;

    /// Top-`k` nearest neighbors of `query`, ranked by descending similarity.
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>>;

    async fn delete_embedding(&self, id: &str) -> Result<()>;

    async fn get_embedding(&self, id: &str) -> Result<Option<StoredEmbedding>>;

    async fn clear(&self) -> Result<()>;

    async fn count(&self) -> Result<usize>;
}

/// In-memory vector store using brute-force cosine scan.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<HashMap<String, StoredEmbedding>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add_embedding(&self, id: &str, vector: Vec<f32>, text: &str) -> Result<()> {
        let mut entries = self.entries.write().expect("vector store lock poisoned");
        entries.insert(
            id.to_string(),
            StoredEmbedding {
                id: id.to_string(),
                vector,
                text: text.to_string(),
            },
        );
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>> {
        let entries = self.entries.read().expect("vector store lock poisoned");
        let mut neighbors: Vec<Neighbor> = entries
            .values()
            .map(|e| Neighbor {
                id: e.id.clone(),
                vector: e.vector.clone(),
                text: e.text.clone(),
                score: cosine_similarity(query, &e.vector),
            })
            .collect();
        neighbors.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        neighbors.truncate(top_k);
        Ok(neighbors)
    }

    async fn delete_embedding(&self, id: &str) -> Result<()> {
        let mut entries = self.entries.write().expect("vector store lock poisoned");
        entries.remove(id);
        Ok(())
    }

    async fn get_embedding(&self, id: &str) -> Result<Option<StoredEmbedding>> {
        let entries = self.entries.read().expect("vector store lock poisoned");
        Ok(entries.get(id).cloned())
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().expect("vector store lock poisoned");
        entries.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let entries = self.entries.read().expect("vector store lock poisoned");
        Ok(entries.len())
    }
}
