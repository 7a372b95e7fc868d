//! Pipeline configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the orchestration pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Plans are truncated to this many steps.
    pub max_plan_steps: usize,
    /// Maximum queries the researcher produces per step.
    pub query_max_results: usize,
    /// Additional attempts when query generation returns unusable output.
    pub query_llm_retries: usize,
    /// Below this evidence count the synthesizer is skipped entirely.
    pub min_evidence_count: usize,
    /// Draft/final answer used when evidence is insufficient.
    pub no_answer_message: String,
    /// Whether the critic stage runs when a critic client is configured.
    pub enable_critic: bool,
    /// Total node visits allowed per run; guards against cyclic graphs.
    pub max_node_visits: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_plan_steps: 4,
            query_max_results: 3,
            query_llm_retries: 2,
            min_evidence_count: 1,
            no_answer_message:
                "I could not find enough supporting evidence in the indexed documents to answer this question."
                    .to_string(),
            enable_critic: true,
            max_node_visits: 25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_plan_steps, 4);
        assert_eq!(config.query_max_results, 3);
        assert!(config.enable_critic);
        assert!(config.max_node_visits > 0);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.max_plan_steps, config.max_plan_steps);
        assert_eq!(restored.no_answer_message, config.no_answer_message);
    }
}
