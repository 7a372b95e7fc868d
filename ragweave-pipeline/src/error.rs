//! Error types for the orchestration pipeline.
//!
//! Uses `thiserror` enums per subsystem: `LlmError` for language-model
//! client failures, `DecodeError` for structured-output parsing, and
//! `PipelineError` as the top-level type threaded through graph execution.

use ragweave_core::RetrievalError;

/// Errors from language-model client interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Failure to decode structured model output.
#[derive(Debug, thiserror::Error)]
#[error("Failed to decode model output as JSON: {message}")]
pub struct DecodeError {
    pub message: String,
}

/// Top-level error type for pipeline runs.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("No language-model client configured for {agent}")]
    MissingClient { agent: String },

    #[error("Planner produced a plan with zero steps")]
    EmptyPlan,

    #[error("Research requires a plan, but none was produced")]
    MissingPlan,

    #[error("Graph references unknown node '{name}'")]
    UnknownNode { name: String },

    #[error("Conditional edge from '{node}' returned unmapped label '{label}'")]
    MissingRoute { node: String, label: String },

    #[error("Maximum node visits ({max}) reached without completing the run")]
    MaxVisitsExceeded { max: usize },

    #[error("Run was cancelled")]
    Cancelled,
}

/// A type alias for results using `PipelineError`.
pub type Result<T> = std::result::Result<T, PipelineError>;
