//! Pipeline data model: plans, evidence, critic feedback, and the typed
//! state threaded through the graph.
//!
//! `Plan` and `CriticFeedback` double as the JSON wire contracts exchanged
//! with the language model, so their serde field names must round-trip
//! exactly.

use chrono::{DateTime, Utc};
use ragweave_core::{Chunk, Document};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// An ordered research plan produced by the planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

/// One actionable sub-goal within a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub expected_evidence: String,
    #[serde(default)]
    pub downstream_support: String,
}

/// A retrieved chunk attributed to the plan step and query that surfaced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub step_id: String,
    pub query: String,
    pub chunk: Chunk,
    pub document: Option<Document>,
    pub score: f32,
    #[serde(default)]
    pub summary: String,
}

/// Critic verdict on a draft answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    #[default]
    Approve,
    Revise,
}

/// Structured review returned by the critic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriticFeedback {
    #[serde(default)]
    pub verdict: Verdict,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub final_answer: String,
}

/// Mutable state owned by exactly one orchestrator run.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub question: String,
    pub plan: Option<Plan>,
    pub evidence: Vec<Evidence>,
    pub draft: Option<String>,
    pub critic: Option<CriticFeedback>,
}

impl PipelineState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    /// Merge a batch of evidence, keeping one entry per (step, chunk) pair.
    ///
    /// When the same chunk is rediscovered within a step, the higher score
    /// wins and the producing query is overwritten; entries are never
    /// duplicated.
    pub fn merge_evidence(&mut self, incoming: Vec<Evidence>) {
        let mut index: HashMap<(String, String), usize> = self
            .evidence
            .iter()
            .enumerate()
            .map(|(i, e)| ((e.step_id.clone(), e.chunk.id.clone()), i))
            .collect();

        for item in incoming {
            let key = (item.step_id.clone(), item.chunk.id.clone());
            match index.get(&key) {
                Some(&i) => {
                    if item.score > self.evidence[i].score {
                        self.evidence[i] = item;
                    }
                }
                None => {
                    index.insert(key, self.evidence.len());
                    self.evidence.push(item);
                }
            }
        }
    }
}

/// Final output of a pipeline run, with run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub run_id: Uuid,
    pub question: String,
    pub plan: Option<Plan>,
    pub evidence: Vec<Evidence>,
    pub draft_answer: String,
    pub critic: Option<CriticFeedback>,
    pub final_answer: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub node_visits: usize,
}
