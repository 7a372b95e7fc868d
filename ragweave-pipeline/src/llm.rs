//! Language-model client contract.
//!
//! The pipeline only needs one operation: generate an assistant message from
//! a conversation. Concrete HTTP-backed providers implement this trait
//! outside the pipeline crate.

use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// JSON schema describing a tool the model may call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A language-model client capable of one-shot generation.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate an assistant message for the given conversation.
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<Message, LlmError>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
