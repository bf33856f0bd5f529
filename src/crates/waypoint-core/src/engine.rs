//! The graph executor: per-node protocol, routing, halt, resume

use crate::error::{EngineError, Result};
use crate::graph::{CheckpointPolicy, Edge, Graph, END};
use crate::state::FlowState;
use std::sync::Arc;
use waypoint_checkpoint::{CheckpointMetadata, CheckpointPhase, CheckpointStore};

/// Executes a [`Graph`] over a session's state, checkpointing through the
/// injected store.
///
/// The engine is stateless between calls; everything durable lives in the
/// checkpoint store. Callers serialize turns per session (one turn or one
/// resume in flight at a time) - the engine itself imposes no locking.
pub struct GraphEngine<S: FlowState> {
    graph: Graph<S>,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl<S: FlowState> GraphEngine<S> {
    /// Build an engine for a validated graph.
    pub fn new(graph: Graph<S>, checkpoints: Arc<dyn CheckpointStore>) -> Result<Self> {
        graph.validate()?;
        Ok(Self { graph, checkpoints })
    }

    pub fn graph(&self) -> &Graph<S> {
        &self.graph
    }

    /// Run one turn from the graph entry point.
    ///
    /// Returns the final state: either a terminal state (the run reached
    /// `END`) or a halted state (a node raised the halt flag, e.g. a
    /// human-in-the-loop pause). The caller distinguishes the two via
    /// [`FlowState::is_halted`].
    pub async fn invoke(&self, session_id: &str, state: S) -> Result<S> {
        self.run_from(session_id, self.graph.entry().to_string(), state)
            .await
    }

    /// Re-enter the graph at an explicit node with restored state.
    ///
    /// Used after an approval decision: the caller loads the pause-era
    /// checkpoint, merges the decision into the state, and resumes at the
    /// node that follows the gate. The normal per-node protocol applies
    /// from there on.
    pub async fn resume(&self, session_id: &str, node_id: &str, state: S) -> Result<S> {
        self.graph.node(node_id)?;
        self.run_from(session_id, node_id.to_string(), state).await
    }

    async fn run_from(&self, session_id: &str, start: String, mut state: S) -> Result<S> {
        let mut current = start;

        loop {
            if current == END {
                // Terminal snapshot for the turn; pause paths never get here.
                self.save(session_id, END, &state, CheckpointPhase::End)
                    .await?;
                return Ok(state);
            }

            let spec = self.graph.node(&current)?;

            if state.is_halted() {
                return Ok(state);
            }

            if spec.checkpoint == CheckpointPolicy::Full {
                self.save(session_id, &current, &state, CheckpointPhase::Start)
                    .await?;
            }

            tracing::debug!(session_id, node = %current, "executing node");
            state = (spec.executor)(state).await?;
            state.record_node(&current);

            if matches!(
                spec.checkpoint,
                CheckpointPolicy::End | CheckpointPolicy::Full
            ) {
                self.save(session_id, &current, &state, CheckpointPhase::End)
                    .await?;
            }

            if state.is_halted() {
                tracing::info!(session_id, node = %current, "turn halted");
                return Ok(state);
            }

            current = self.next_node(&current, &state)?;
        }
    }

    fn next_node(&self, from: &str, state: &S) -> Result<String> {
        match self.graph.edge(from) {
            Some(Edge::Direct(target)) => Ok(target.clone()),
            Some(Edge::Conditional { selector, branches }) => {
                let key = selector(state);
                branches
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| EngineError::Routing {
                        node: from.to_string(),
                        key,
                    })
            }
            None => Err(EngineError::InvalidGraph(format!(
                "node `{from}` has no outgoing edge"
            ))),
        }
    }

    async fn save(
        &self,
        session_id: &str,
        node_id: &str,
        state: &S,
        phase: CheckpointPhase,
    ) -> Result<()> {
        let snapshot = serde_json::to_value(state).map_err(waypoint_checkpoint::CheckpointError::from)?;
        self.checkpoints
            .save(
                session_id,
                node_id,
                snapshot,
                CheckpointMetadata::new(phase).with_extra("node", serde_json::json!(node_id)),
            )
            .await?;
        Ok(())
    }
}
