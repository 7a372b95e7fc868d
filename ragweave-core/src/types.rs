//! Core data model: documents, chunks, and retrieval results.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Metadata key marking a chunk's section kind ("title" or "body").
pub const META_SECTION: &str = "section";
/// Metadata key recording which retrieval path produced a result.
pub const META_RETRIEVAL: &str = "retrieval";
/// Section value for heading chunks.
pub const SECTION_TITLE: &str = "title";
/// Section value for body chunks.
pub const SECTION_BODY: &str = "body";
/// Retrieval value for keyword-fallback results.
pub const RETRIEVAL_KEYWORD: &str = "keyword";

/// An ingested document. Immutable once indexed; cloning is deep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with an explicit ID.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            source: source.into(),
            metadata: HashMap::new(),
        }
    }

    /// Ensure the document carries a stable ID, deriving one from
    /// source + content when absent.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = derive_document_id(&self.source, &self.content);
        }
    }
}

/// Derive a deterministic document ID from source and content.
///
/// Stable across runs: the same (source, content) pair always maps to the
/// same ID, unlike a session-local counter.
pub fn derive_document_id(source: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"\0");
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    format!("doc-{hex}")
}

/// A bounded slice of a document, produced exclusively by a chunker and
/// never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    /// Section kind: "title", "body", or empty for the token-window policy.
    #[serde(default)]
    pub section: String,
    /// Position of this chunk within its document.
    pub ordinal: usize,
    pub token_count: usize,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// Whether this chunk is tagged as a heading.
    pub fn is_title(&self) -> bool {
        self.section == SECTION_TITLE
            || self
                .metadata
                .get(META_SECTION)
                .is_some_and(|v| v == SECTION_TITLE)
    }
}

/// A ranked search hit from the hybrid engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f32,
}
