//! Minimal state-graph executor.
//!
//! Nodes mutate a shared typed state; edges are either direct or conditional
//! (a router function maps the state to a label, and the label to a target
//! node). A node with no outgoing edge terminates the run. A total visit
//! budget guards against cycles that never converge.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Reserved terminal node name.
pub const END: &str = "__end__";

/// A unit of work in the graph.
#[async_trait]
pub trait GraphNode<S>: Send + Sync {
    async fn run(&self, state: &mut S) -> Result<()>;
}

/// Adapter turning a synchronous closure into a node. Used for gate nodes
/// whose only job is to anchor a conditional edge, and in tests.
pub struct FnNode<S> {
    f: Box<dyn Fn(&mut S) -> Result<()> + Send + Sync>,
}

impl<S> FnNode<S> {
    pub fn new(f: impl Fn(&mut S) -> Result<()> + Send + Sync + 'static) -> Self {
        Self { f: Box::new(f) }
    }

    pub fn noop() -> Self {
        Self::new(|_| Ok(()))
    }
}

#[async_trait]
impl<S: Send> GraphNode<S> for FnNode<S> {
    async fn run(&self, state: &mut S) -> Result<()> {
        (self.f)(state)
    }
}

type Router<S> = Box<dyn Fn(&S) -> String + Send + Sync>;

enum Edge<S> {
    Direct(String),
    Conditional {
        router: Router<S>,
        routes: HashMap<String, String>,
    },
}

/// A directed graph of named nodes executed sequentially from an entry node.
pub struct StateGraph<S> {
    nodes: HashMap<String, Box<dyn GraphNode<S>>>,
    edges: HashMap<String, Edge<S>>,
    entry: Option<String>,
    max_visits: usize,
}

impl<S: Send> StateGraph<S> {
    pub fn new(max_visits: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
            max_visits,
        }
    }

    pub fn add_node(&mut self, name: impl Into<String>, node: impl GraphNode<S> + 'static) {
        self.nodes.insert(name.into(), Box::new(node));
    }

    /// Unconditional transition. `END` as target terminates the run.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.insert(from.into(), Edge::Direct(to.into()));
    }

    /// Routed transition: `router` maps the state to a label, `routes` maps
    /// labels to target nodes.
    pub fn add_conditional_edge(
        &mut self,
        from: impl Into<String>,
        router: impl Fn(&S) -> String + Send + Sync + 'static,
        routes: HashMap<String, String>,
    ) {
        self.edges.insert(
            from.into(),
            Edge::Conditional {
                router: Box::new(router),
                routes,
            },
        );
    }

    pub fn set_entry(&mut self, name: impl Into<String>) {
        self.entry = Some(name.into());
    }

    /// Execute from the entry node until reaching `END` (or a node without an
    /// outgoing edge). Returns the number of node visits.
    pub async fn run(&self, state: &mut S) -> Result<usize> {
        self.execute(state, None).await
    }

    /// Like [`run`](Self::run), but checks `cancel` between node visits.
    pub async fn run_with_cancel(&self, state: &mut S, cancel: &CancellationToken) -> Result<usize> {
        self.execute(state, Some(cancel)).await
    }

    async fn execute(&self, state: &mut S, cancel: Option<&CancellationToken>) -> Result<usize> {
        let mut current = match &self.entry {
            Some(entry) => entry.clone(),
            None => return Ok(0),
        };
        let mut visits = 0usize;

        while current != END {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    tracing::debug!(node = %current, visits, "Run cancelled");
                    return Err(PipelineError::Cancelled);
                }
            }
            if visits >= self.max_visits {
                return Err(PipelineError::MaxVisitsExceeded {
                    max: self.max_visits,
                });
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| PipelineError::UnknownNode {
                    name: current.clone(),
                })?;
            tracing::debug!(node = %current, visits, "Running graph node");
            node.run(state).await?;
            visits += 1;

            current = match self.edges.get(&current) {
                None => END.to_string(),
                Some(Edge::Direct(to)) => to.clone(),
                Some(Edge::Conditional { router, routes }) => {
                    let label = router(state);
                    routes
                        .get(&label)
                        .cloned()
                        .ok_or_else(|| PipelineError::MissingRoute {
                            node: current.clone(),
                            label,
                        })?
                }
            };
        }
        Ok(visits)
    }
}
