//! Critic agent: optional structured review of the draft answer.
//!
//! Critique must never fail an otherwise successful run: a missing client
//! skips the stage, and a call or decode failure degrades to a best-effort
//! approval that keeps the draft as the final answer.

use crate::decode::decode_json;
use crate::error::Result;
use crate::llm::{LlmClient, Message};
use crate::state::{CriticFeedback, Evidence, Plan, Verdict};
use std::sync::Arc;

const CRITIC_SYSTEM_PROMPT: &str = "\
You review a drafted answer against the research plan and evidence. Respond \
with strict JSON only, matching: {\"verdict\":\"approve\"|\"revise\",\
\"issues\":[\"...\"],\"notes\":\"...\",\"final_answer\":\"...\"}. \
Set final_answer to the improved answer, or repeat the draft when it already \
holds up. Do not include any prose outside the JSON.";

/// Reviews drafts and proposes a final answer.
#[derive(Clone)]
pub struct Critic {
    client: Option<Arc<dyn LlmClient>>,
}

impl Critic {
    pub fn new(client: Option<Arc<dyn LlmClient>>) -> Self {
        Self { client }
    }

    /// Review `draft`. Returns `None` when no critic client is configured.
    pub async fn review(
        &self,
        question: &str,
        draft: &str,
        plan: Option<&Plan>,
        evidence: &[Evidence],
    ) -> Result<Option<CriticFeedback>> {
        let Some(client) = &self.client else {
            return Ok(None);
        };

        let mut user = format!("Question: {question}\n\nDraft answer:\n{draft}\n");
        if let Some(plan) = plan {
            let plan_json = serde_json::to_string(plan).unwrap_or_default();
            user.push_str(&format!("\nResearch plan:\n{plan_json}\n"));
        }
        user.push_str(&format!("\nEvidence items: {}\n", evidence.len()));
        for item in evidence {
            user.push_str(&format!(
                "- [{} / {}] {}\n",
                item.step_id, item.chunk.document_id, item.chunk.content
            ));
        }

        let reply = match client
            .generate(&[Message::system(CRITIC_SYSTEM_PROMPT), Message::user(user)], &[])
            .await
        {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(%error, "Critic call failed, keeping draft");
                return Ok(Some(approve_with_note(
                    format!("critic call failed: {error}"),
                    draft,
                )));
            }
        };

        match decode_json::<CriticFeedback>(&reply.content) {
            Ok(mut feedback) => {
                if feedback.final_answer.trim().is_empty() {
                    feedback.final_answer = draft.to_string();
                }
                Ok(Some(feedback))
            }
            Err(error) => {
                tracing::warn!(%error, "Undecodable critic output, keeping draft");
                Ok(Some(approve_with_note(
                    format!("critic output could not be decoded: {error}"),
                    draft,
                )))
            }
        }
    }
}

fn approve_with_note(notes: String, draft: &str) -> CriticFeedback {
    CriticFeedback {
        verdict: Verdict::Approve,
        issues: Vec::new(),
        notes,
        final_answer: draft.to_string(),
    }
}
