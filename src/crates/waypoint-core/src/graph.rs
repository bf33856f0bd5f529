//! Graph structure: nodes, edges, checkpoint policies

use crate::error::{EngineError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Node identifier - unique name within a graph
pub type NodeId = String;

/// Virtual entry marker. Not an executable node.
pub const START: &str = "__start__";

/// Virtual sink marker. An edge to `END` makes a node terminal.
pub const END: &str = "__end__";

/// Boxed async node function: takes the state, returns the post-state.
pub type NodeExecutor<S> = Arc<
    dyn Fn(S) -> futures::future::BoxFuture<'static, Result<S>> + Send + Sync,
>;

/// Pure routing function for conditional edges.
///
/// Selectors borrow the state immutably - routing must never mutate.
pub type EdgeSelector<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// Wrap a plain async closure into a [`NodeExecutor`].
pub fn node_fn<S, F, Fut>(f: F) -> NodeExecutor<S>
where
    S: Send + 'static,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S>> + Send + 'static,
{
    Arc::new(move |state| -> futures::future::BoxFuture<'static, Result<S>> {
        Box::pin(f(state))
    })
}

/// How the engine checkpoints around a node.
///
/// `Skip` suits pure or read-only nodes, `End` suits state-building nodes,
/// and `Full` brackets a side effect so that a crash between the `start`
/// checkpoint and the `end` checkpoint is detectable (the at-most-once
/// gate in front of downstream calls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckpointPolicy {
    /// No checkpoint for this node
    Skip,
    /// One `phase=end` checkpoint after the node completes
    #[default]
    End,
    /// `phase=start` before invocation and `phase=end` after
    Full,
}

/// A node definition: name, executor, checkpoint policy.
#[derive(Clone)]
pub struct NodeSpec<S> {
    pub name: NodeId,
    pub executor: NodeExecutor<S>,
    pub checkpoint: CheckpointPolicy,
}

impl<S> NodeSpec<S> {
    pub fn new(
        name: impl Into<String>,
        executor: NodeExecutor<S>,
        checkpoint: CheckpointPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            executor,
            checkpoint,
        }
    }
}

impl<S> std::fmt::Debug for NodeSpec<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("executor", &"<fn>")
            .field("checkpoint", &self.checkpoint)
            .finish()
    }
}

/// Outgoing edge of a node.
#[derive(Clone)]
pub enum Edge<S> {
    /// Unconditional transition
    Direct(NodeId),

    /// Dynamic routing: the selector picks a key, the branch map picks the node
    Conditional {
        selector: EdgeSelector<S>,
        branches: HashMap<String, NodeId>,
    },
}

impl<S> std::fmt::Debug for Edge<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(target) => f.debug_tuple("Direct").field(target).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("selector", &"<fn>")
                .field("branches", branches)
                .finish(),
        }
    }
}

/// A directed graph of nodes with a single entry point and the `END` sink.
///
/// Each node has at most one outgoing edge; branching goes through a
/// conditional edge's branch map.
#[derive(Debug, Clone)]
pub struct Graph<S> {
    nodes: HashMap<NodeId, NodeSpec<S>>,
    edges: HashMap<NodeId, Edge<S>>,
    entry: NodeId,
}

impl<S> Graph<S> {
    /// Create a graph with the given entry node.
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: entry.into(),
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Register a node. Re-adding a name replaces the previous definition.
    pub fn add_node(&mut self, spec: NodeSpec<S>) -> &mut Self {
        self.nodes.insert(spec.name.clone(), spec);
        self
    }

    /// Add an unconditional edge `from -> to`.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges.insert(from.into(), Edge::Direct(to.into()));
        self
    }

    /// Add a conditional edge routed by `selector` through `branches`.
    pub fn add_conditional_edge(
        &mut self,
        from: impl Into<String>,
        selector: EdgeSelector<S>,
        branches: HashMap<String, NodeId>,
    ) -> &mut Self {
        self.edges
            .insert(from.into(), Edge::Conditional { selector, branches });
        self
    }

    pub fn node(&self, id: &str) -> Result<&NodeSpec<S>> {
        self.nodes
            .get(id)
            .ok_or_else(|| EngineError::UnknownNode(id.to_string()))
    }

    pub fn edge(&self, from: &str) -> Option<&Edge<S>> {
        self.edges.get(from)
    }

    /// Structural validation: the entry node exists, every edge leaves a
    /// known node, and every target (including conditional branches) is a
    /// known node or `END`.
    pub fn validate(&self) -> Result<()> {
        if !self.nodes.contains_key(&self.entry) {
            return Err(EngineError::InvalidGraph(format!(
                "entry node `{}` is not defined",
                self.entry
            )));
        }

        let known = |id: &str| id == END || self.nodes.contains_key(id);

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(EngineError::InvalidGraph(format!(
                    "edge leaves undefined node `{from}`"
                )));
            }
            match edge {
                Edge::Direct(target) => {
                    if !known(target) {
                        return Err(EngineError::InvalidGraph(format!(
                            "edge `{from}` -> `{target}` points at an undefined node"
                        )));
                    }
                }
                Edge::Conditional { branches, .. } => {
                    for (key, target) in branches {
                        if !known(target) {
                            return Err(EngineError::InvalidGraph(format!(
                                "branch `{key}` of `{from}` points at undefined node `{target}`"
                            )));
                        }
                    }
                }
            }
        }

        for name in self.nodes.keys() {
            if !self.edges.contains_key(name) {
                return Err(EngineError::InvalidGraph(format!(
                    "node `{name}` has no outgoing edge; terminal nodes must edge to END"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    type State = Vec<String>;

    fn noop() -> NodeExecutor<State> {
        node_fn(|state: State| async move { Ok::<_, EngineError>(state) })
    }

    fn spec(name: &str) -> NodeSpec<State> {
        NodeSpec::new(name, noop(), CheckpointPolicy::Skip)
    }

    #[test]
    fn validate_accepts_a_linear_graph() -> Result<()> {
        let mut graph = Graph::new("a");
        graph.add_node(spec("a"));
        graph.add_node(spec("b"));
        graph.add_edge("a", "b");
        graph.add_edge("b", END);
        graph.validate()
    }

    #[test]
    fn validate_rejects_missing_entry() {
        let mut graph: Graph<State> = Graph::new("ghost");
        graph.add_node(spec("a"));
        graph.add_edge("a", END);
        assert!(matches!(
            graph.validate(),
            Err(EngineError::InvalidGraph(_))
        ));
    }

    #[test]
    fn validate_rejects_dangling_branch_target() {
        let mut graph = Graph::new("a");
        graph.add_node(spec("a"));
        graph.add_conditional_edge(
            "a",
            Arc::new(|_: &State| "x".to_string()),
            HashMap::from([("x".to_string(), "missing".to_string())]),
        );
        assert!(graph.validate().is_err());
    }

    #[test]
    fn validate_rejects_node_without_outgoing_edge() {
        let mut graph = Graph::new("a");
        graph.add_node(spec("a"));
        assert!(graph.validate().is_err());
    }
}
