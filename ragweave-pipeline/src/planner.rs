//! Planner agent: turns a question into an ordered research plan.

use crate::decode::decode_json;
use crate::error::{PipelineError, Result};
use crate::llm::{LlmClient, Message};
use crate::state::Plan;
use std::sync::Arc;

const PLANNER_SYSTEM_PROMPT: &str = "\
You are a research planner. Break the user's question into at most {max_steps} \
ordered research steps. Respond with strict JSON only, matching:\n\
{\"strategy\":\"...\",\"steps\":[{\"id\":\"step-1\",\"goal\":\"...\",\
\"questions\":[\"...\"],\"expected_evidence\":\"...\",\"downstream_support\":\"...\"}]}\n\
Do not include any prose outside the JSON.";

/// Produces a [`Plan`] via the language model.
#[derive(Clone)]
pub struct Planner {
    client: Option<Arc<dyn LlmClient>>,
    max_steps: usize,
}

impl Planner {
    pub fn new(client: Option<Arc<dyn LlmClient>>, max_steps: usize) -> Self {
        Self { client, max_steps }
    }

    /// Plan the research for `question`.
    ///
    /// Fails without a configured client or when the decoded plan carries
    /// zero steps. Plans are truncated to the configured maximum and missing
    /// step IDs are backfilled sequentially.
    pub async fn plan(&self, question: &str) -> Result<Plan> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PipelineError::MissingClient {
                agent: "planner".into(),
            })?;

        let system =
            PLANNER_SYSTEM_PROMPT.replace("{max_steps}", &self.max_steps.to_string());
        let reply = client
            .generate(&[Message::system(system), Message::user(question)], &[])
            .await?;

        let mut plan: Plan = decode_json(&reply.content)?;
        if plan.steps.is_empty() {
            return Err(PipelineError::EmptyPlan);
        }
        plan.steps.truncate(self.max_steps);
        for (i, step) in plan.steps.iter_mut().enumerate() {
            if step.id.trim().is_empty() {
                step.id = format!("step-{}", i + 1);
            }
        }
        tracing::debug!(steps = plan.steps.len(), strategy = %plan.strategy, "Plan ready");
        Ok(plan)
    }
}
