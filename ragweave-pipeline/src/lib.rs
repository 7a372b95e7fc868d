//! Multi-agent orchestration over the hybrid retrieval engine.
//!
//! A question flows through a small state graph: the planner decomposes it
//! into research steps, the researcher turns steps into retrieval queries
//! and collects attributed evidence, the synthesizer drafts an answer, and
//! an optional critic reviews the draft. All model interaction goes through
//! the [`llm::LlmClient`] trait, so the pipeline is fully testable with
//! scripted clients.

pub mod config;
pub mod critic;
pub mod decode;
pub mod error;
pub mod graph;
pub mod llm;
pub mod pipeline;
pub mod planner;
pub mod registry;
pub mod researcher;
pub mod state;
pub mod synthesizer;

pub use config::PipelineConfig;
pub use critic::Critic;
pub use decode::decode_json;
pub use error::{DecodeError, LlmError, PipelineError, Result};
pub use graph::{END, FnNode, GraphNode, StateGraph};
pub use llm::{LlmClient, Message, Role, ToolSchema};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use planner::Planner;
pub use registry::{ClientRegistry, RegistrationHandle};
pub use researcher::Researcher;
pub use state::{
    CriticFeedback, Evidence, PipelineResponse, PipelineState, Plan, PlanStep, Verdict,
};
pub use synthesizer::Synthesizer;
