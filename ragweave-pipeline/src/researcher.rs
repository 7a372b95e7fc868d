//! Research agent: expands a plan step into retrieval queries.
//!
//! Query generation is best-effort. The language-model path is tried first
//! when a client is configured; a deterministic fallback built from the step
//! itself guarantees that at least one query is always produced.

use crate::decode::decode_json;
use crate::llm::{LlmClient, Message};
use crate::state::PlanStep;
use serde::Deserialize;
use std::sync::Arc;

const QUERY_SYSTEM_PROMPT: &str = "\
You generate search queries for a document retrieval system. Given a research \
step, respond with strict JSON only, matching: {\"queries\":[\"...\"]}. \
Produce short keyword-style queries. Do not include any prose outside the JSON.";

#[derive(Debug, Deserialize)]
struct QueriesPayload {
    #[serde(default)]
    queries: Vec<String>,
}

/// Produces retrieval queries for each plan step.
#[derive(Clone)]
pub struct Researcher {
    client: Option<Arc<dyn LlmClient>>,
    max_queries: usize,
    retries: usize,
}

impl Researcher {
    pub fn new(client: Option<Arc<dyn LlmClient>>, max_queries: usize, retries: usize) -> Self {
        Self {
            client,
            max_queries,
            retries,
        }
    }

    /// Build queries for `step`. Never fails and never returns an empty list.
    pub async fn build_queries(&self, question: &str, step: &PlanStep) -> Vec<String> {
        if let Some(client) = &self.client {
            if let Some(queries) = self.queries_from_model(client, question, step).await {
                return queries;
            }
        }
        self.fallback_queries(question, step)
    }

    /// LLM path: decode `{"queries":[...]}`, retrying on unusable output.
    async fn queries_from_model(
        &self,
        client: &Arc<dyn LlmClient>,
        question: &str,
        step: &PlanStep,
    ) -> Option<Vec<String>> {
        let user = format!(
            "Overall question: {question}\nStep goal: {}\nStep questions: {}\nExpected evidence: {}",
            step.goal,
            step.questions.join("; "),
            step.expected_evidence,
        );
        let messages = [Message::system(QUERY_SYSTEM_PROMPT), Message::user(user)];

        for attempt in 0..=self.retries {
            let reply = match client.generate(&messages, &[]).await {
                Ok(reply) => reply,
                Err(error) => {
                    tracing::warn!(%error, step_id = %step.id, "Query generation call failed");
                    return None;
                }
            };
            match decode_json::<QueriesPayload>(&reply.content) {
                Ok(payload) => {
                    let queries = dedup_queries(payload.queries, self.max_queries);
                    if !queries.is_empty() {
                        return Some(queries);
                    }
                    tracing::debug!(attempt, step_id = %step.id, "Empty query list, retrying");
                }
                Err(error) => {
                    tracing::debug!(attempt, %error, step_id = %step.id, "Undecodable query output, retrying");
                }
            }
        }
        None
    }

    /// Deterministic path: derive queries from the step text alone.
    fn fallback_queries(&self, question: &str, step: &PlanStep) -> Vec<String> {
        let goal = step.goal.trim();
        let mut raw: Vec<String> = step.questions.clone();
        if !step.expected_evidence.trim().is_empty() {
            raw.push(format!("{goal} {}", step.expected_evidence.trim()));
        }
        raw.push(format!("{goal} {}", question.trim()));
        raw.push(goal.to_string());

        let queries = dedup_queries(raw, self.max_queries);
        if queries.is_empty() {
            let single = if goal.is_empty() {
                question.trim().to_string()
            } else {
                goal.to_string()
            };
            return vec![single];
        }
        queries
    }
}

/// Trim, drop empties, dedup case-insensitively preserving order, then cap.
fn dedup_queries(raw: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for query in raw {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed.to_string());
            if out.len() == cap {
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::ToolSchema;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SequencedClient {
        replies: Vec<Result<String, ()>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for SequencedClient {
        async fn generate(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
        ) -> Result<Message, LlmError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.get(i) {
                Some(Ok(reply)) => Ok(Message::assistant(reply.clone())),
                Some(Err(())) => Err(LlmError::Connection {
                    message: "refused".into(),
                }),
                None => Err(LlmError::Connection {
                    message: "exhausted".into(),
                }),
            }
        }

        fn model_name(&self) -> &str {
            "sequenced"
        }
    }

    fn step(goal: &str, questions: &[&str], expected: &str) -> PlanStep {
        PlanStep {
            id: "step-1".into(),
            goal: goal.into(),
            questions: questions.iter().map(|q| q.to_string()).collect(),
            expected_evidence: expected.into(),
            downstream_support: String::new(),
        }
    }

    #[tokio::test]
    async fn test_model_queries_deduped_and_capped() {
        let client = Arc::new(SequencedClient {
            replies: vec![Ok(
                r#"{"queries":["Shipping Times","shipping times","refund window","holiday policy"]}"#
                    .into(),
            )],
            calls: AtomicUsize::new(0),
        });
        let researcher = Researcher::new(Some(client), 2, 0);
        let queries = researcher.build_queries("q", &step("g", &[], "")).await;
        assert_eq!(queries, vec!["Shipping Times", "refund window"]);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let client = Arc::new(SequencedClient {
            replies: vec![
                Ok("not json".into()),
                Ok(r#"{"queries":[]}"#.into()),
                Ok(r#"{"queries":["found it"]}"#.into()),
            ],
            calls: AtomicUsize::new(0),
        });
        let researcher = Researcher::new(Some(client.clone()), 3, 2);
        let queries = researcher.build_queries("q", &step("g", &[], "")).await;
        assert_eq!(queries, vec!["found it"]);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_call_failure_falls_back_without_retry() {
        let client = Arc::new(SequencedClient {
            replies: vec![Err(())],
            calls: AtomicUsize::new(0),
        });
        let researcher = Researcher::new(Some(client.clone()), 3, 2);
        let queries = researcher
            .build_queries("how long is shipping", &step("shipping policy", &[], ""))
            .await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert!(queries.contains(&"shipping policy".to_string()));
    }

    #[tokio::test]
    async fn test_fallback_without_client() {
        let researcher = Researcher::new(None, 4, 0);
        let queries = researcher
            .build_queries(
                "how long is shipping",
                &step("shipping policy", &["how many days?"], "delivery estimate"),
            )
            .await;
        assert_eq!(
            queries,
            vec![
                "how many days?",
                "shipping policy delivery estimate",
                "shipping policy how long is shipping",
                "shipping policy",
            ]
        );
    }

    #[tokio::test]
    async fn test_fallback_never_empty() {
        let researcher = Researcher::new(None, 3, 0);
        let queries = researcher.build_queries("   ", &step("", &[], "")).await;
        assert_eq!(queries.len(), 1);
    }
}
