//! Error types for the retrieval engine.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering configuration, embedding, vector-store, and chunking failures.

/// Top-level error type for the retrieval engine.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Invalid retrieval configuration: {message}")]
    Config { message: String },

    #[error("Embedding provider failed: {message}")]
    Embedding { message: String },

    #[error("Vector store operation failed: {message}")]
    VectorStore { message: String },

    #[error("Chunking failed for document '{document_id}': {message}")]
    Chunking {
        document_id: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A type alias for results using `RetrievalError`.
pub type Result<T> = std::result::Result<T, RetrievalError>;
