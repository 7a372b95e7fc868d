//! Pipeline assembly: wires the agents into a state graph and runs it.
//!
//! Node order is planner -> research -> synthesis -> critic gate, with the
//! gate routing to the critic stage or straight to termination. The critic
//! runs only when enabled in configuration and a critic client is present.

use crate::config::PipelineConfig;
use crate::critic::Critic;
use crate::error::{PipelineError, Result};
use crate::graph::{FnNode, GraphNode, StateGraph, END};
use crate::llm::LlmClient;
use crate::planner::Planner;
use crate::researcher::Researcher;
use crate::state::{Evidence, PipelineResponse, PipelineState};
use crate::synthesizer::Synthesizer;
use async_trait::async_trait;
use chrono::Utc;
use ragweave_core::HybridRetrievalEngine;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// --- Graph nodes ---

struct PlannerNode {
    planner: Planner,
}

#[async_trait]
impl GraphNode<PipelineState> for PlannerNode {
    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let plan = self.planner.plan(&state.question).await?;
        state.plan = Some(plan);
        Ok(())
    }
}

struct ResearchNode {
    researcher: Researcher,
    engine: Arc<HybridRetrievalEngine>,
}

#[async_trait]
impl GraphNode<PipelineState> for ResearchNode {
    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let plan = state.plan.clone().ok_or(PipelineError::MissingPlan)?;
        for step in &plan.steps {
            let queries = self.researcher.build_queries(&state.question, step).await;
            let mut batch = Vec::new();
            for query in queries {
                let results = self.engine.search(&query).await?;
                tracing::debug!(step_id = %step.id, %query, hits = results.len(), "Step query done");
                for result in results {
                    let document = self.engine.document(&result.chunk.document_id);
                    batch.push(Evidence {
                        step_id: step.id.clone(),
                        query: query.clone(),
                        chunk: result.chunk,
                        document,
                        score: result.score,
                        summary: String::new(),
                    });
                }
            }
            state.merge_evidence(batch);
        }
        Ok(())
    }
}

struct SynthesisNode {
    synthesizer: Synthesizer,
    min_evidence: usize,
    no_answer_message: String,
}

#[async_trait]
impl GraphNode<PipelineState> for SynthesisNode {
    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        if state.evidence.len() < self.min_evidence {
            tracing::info!(
                evidence_count = state.evidence.len(),
                required = self.min_evidence,
                "Insufficient evidence, skipping synthesis"
            );
            state.draft = Some(self.no_answer_message.clone());
            return Ok(());
        }
        let draft = self
            .synthesizer
            .compose(&state.question, state.plan.as_ref(), &state.evidence)
            .await?;
        state.draft = Some(draft);
        Ok(())
    }
}

struct CriticNode {
    critic: Critic,
}

#[async_trait]
impl GraphNode<PipelineState> for CriticNode {
    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let draft = state.draft.clone().unwrap_or_default();
        state.critic = self
            .critic
            .review(&state.question, &draft, state.plan.as_ref(), &state.evidence)
            .await?;
        Ok(())
    }
}

// --- Pipeline ---

/// Builder for [`RagPipeline`]. Requires an engine and clients for the
/// planner and synthesizer; researcher and critic clients are optional.
#[derive(Default)]
pub struct RagPipelineBuilder {
    engine: Option<Arc<HybridRetrievalEngine>>,
    config: PipelineConfig,
    planner_client: Option<Arc<dyn LlmClient>>,
    researcher_client: Option<Arc<dyn LlmClient>>,
    synthesizer_client: Option<Arc<dyn LlmClient>>,
    critic_client: Option<Arc<dyn LlmClient>>,
}

impl RagPipelineBuilder {
    pub fn engine(mut self, engine: Arc<HybridRetrievalEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use one client for every agent. Per-agent setters may override it.
    pub fn client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.planner_client = Some(client.clone());
        self.researcher_client = Some(client.clone());
        self.synthesizer_client = Some(client.clone());
        self.critic_client = Some(client);
        self
    }

    pub fn planner_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.planner_client = Some(client);
        self
    }

    pub fn researcher_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.researcher_client = Some(client);
        self
    }

    pub fn synthesizer_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.synthesizer_client = Some(client);
        self
    }

    pub fn critic_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.critic_client = Some(client);
        self
    }

    pub fn build(self) -> Result<RagPipeline> {
        let engine = self.engine.ok_or_else(|| PipelineError::MissingClient {
            agent: "retrieval engine".into(),
        })?;
        if self.planner_client.is_none() {
            return Err(PipelineError::MissingClient {
                agent: "planner".into(),
            });
        }
        if self.synthesizer_client.is_none() {
            return Err(PipelineError::MissingClient {
                agent: "synthesizer".into(),
            });
        }

        let config = self.config;
        let planner = Planner::new(self.planner_client, config.max_plan_steps);
        let researcher = Researcher::new(
            self.researcher_client,
            config.query_max_results,
            config.query_llm_retries,
        );
        let synthesizer = Synthesizer::new(self.synthesizer_client);
        let critic_enabled = config.enable_critic && self.critic_client.is_some();
        let critic = Critic::new(self.critic_client);

        let graph = build_graph(
            engine.clone(),
            &config,
            planner,
            researcher,
            synthesizer,
            critic,
            critic_enabled,
        );

        Ok(RagPipeline {
            engine,
            config,
            graph,
        })
    }
}

fn build_graph(
    engine: Arc<HybridRetrievalEngine>,
    config: &PipelineConfig,
    planner: Planner,
    researcher: Researcher,
    synthesizer: Synthesizer,
    critic: Critic,
    critic_enabled: bool,
) -> StateGraph<PipelineState> {
    let mut graph = StateGraph::new(config.max_node_visits);
    graph.add_node("planner", PlannerNode { planner });
    graph.add_node("research", ResearchNode { researcher, engine });
    graph.add_node(
        "synthesis",
        SynthesisNode {
            synthesizer,
            min_evidence: config.min_evidence_count,
            no_answer_message: config.no_answer_message.clone(),
        },
    );
    graph.add_node("critic_gate", FnNode::noop());
    graph.add_node("critic", CriticNode { critic });

    graph.add_edge("planner", "research");
    graph.add_edge("research", "synthesis");
    graph.add_edge("synthesis", "critic_gate");
    graph.add_conditional_edge(
        "critic_gate",
        move |_: &PipelineState| if critic_enabled { "run" } else { "skip" }.to_string(),
        HashMap::from([
            ("run".to_string(), "critic".to_string()),
            ("skip".to_string(), END.to_string()),
        ]),
    );
    graph.add_edge("critic", END);
    graph.set_entry("planner");
    graph
}

/// Orchestrates plan, research, synthesis, and critique over a retrieval
/// engine.
pub struct RagPipeline {
    engine: Arc<HybridRetrievalEngine>,
    config: PipelineConfig,
    graph: StateGraph<PipelineState>,
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    pub fn engine(&self) -> &Arc<HybridRetrievalEngine> {
        &self.engine
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Answer `question` end to end.
    pub async fn run(&self, question: &str) -> Result<PipelineResponse> {
        self.execute(question, None).await
    }

    /// Like [`run`](Self::run), but abortable between graph nodes.
    pub async fn run_with_cancel(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<PipelineResponse> {
        self.execute(question, Some(cancel)).await
    }

    async fn execute(
        &self,
        question: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<PipelineResponse> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::debug!(%run_id, question, "Pipeline run started");

        let mut state = PipelineState::new(question);
        let node_visits = match cancel {
            Some(token) => self.graph.run_with_cancel(&mut state, token).await?,
            None => self.graph.run(&mut state).await?,
        };

        let draft_answer = state.draft.clone().unwrap_or_default();
        let final_answer = state
            .critic
            .as_ref()
            .map(|feedback| feedback.final_answer.trim())
            .filter(|answer| !answer.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| draft_answer.clone());

        let finished_at = Utc::now();
        tracing::debug!(
            %run_id,
            node_visits,
            evidence_count = state.evidence.len(),
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "Pipeline run finished"
        );

        Ok(PipelineResponse {
            run_id,
            question: state.question,
            plan: state.plan,
            evidence: state.evidence,
            draft_answer,
            critic: state.critic,
            final_answer,
            started_at,
            finished_at,
            node_visits,
        })
    }
}
