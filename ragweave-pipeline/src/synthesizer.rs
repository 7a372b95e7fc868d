//! Synthesis agent: composes a draft answer from collected evidence.

use crate::error::{PipelineError, Result};
use crate::llm::{LlmClient, Message};
use crate::state::{Evidence, Plan};
use std::sync::Arc;

const SYNTHESIS_SYSTEM_PROMPT: &str = "\
You are a research writer. Answer the user's question using only the provided \
evidence blocks. Cite nothing the evidence does not support; say so when the \
evidence is insufficient for part of the question. Answer in plain prose.";

/// Drafts an answer grounded in evidence.
#[derive(Clone)]
pub struct Synthesizer {
    client: Option<Arc<dyn LlmClient>>,
}

impl Synthesizer {
    pub fn new(client: Option<Arc<dyn LlmClient>>) -> Self {
        Self { client }
    }

    /// Compose a draft answer for `question` from `evidence`.
    pub async fn compose(
        &self,
        question: &str,
        plan: Option<&Plan>,
        evidence: &[Evidence],
    ) -> Result<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PipelineError::MissingClient {
                agent: "synthesizer".into(),
            })?;

        let mut user = format!("Question: {question}\n");
        if let Some(plan) = plan {
            let plan_json =
                serde_json::to_string(plan).map_err(ragweave_core::RetrievalError::from)?;
            user.push_str("Research plan:\n");
            user.push_str(&plan_json);
            user.push('\n');
        }
        user.push_str("\nEvidence:\n");
        user.push_str(&format_evidence(evidence));

        let reply = client
            .generate(&[Message::system(SYNTHESIS_SYSTEM_PROMPT), Message::user(user)], &[])
            .await?;
        tracing::debug!(
            evidence_count = evidence.len(),
            draft_chars = reply.content.len(),
            "Draft composed"
        );
        Ok(reply.content.trim().to_string())
    }
}

/// Render evidence as attributed text blocks.
fn format_evidence(evidence: &[Evidence]) -> String {
    let mut out = String::new();
    for item in evidence {
        out.push_str(&format!(
            "[Doc:{} Step:{} Score:{:.3}]\n{}\n\n",
            item.chunk.document_id, item.step_id, item.score, item.chunk.content
        ));
    }
    out
}
