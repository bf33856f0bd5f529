//! Engine error types

use thiserror::Error;
use waypoint_checkpoint::CheckpointError;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by graph construction and execution.
///
/// Domain failures inside nodes are *not* errors at this level - nodes
/// record them in state and return normally. Only structural problems
/// (bad routing, missing nodes) and storage failures surface here, and
/// both are fatal for the turn.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A conditional edge selected a key with no target in the edge map
    #[error("no edge target for key `{key}` leaving node `{node}`")]
    Routing { node: String, key: String },

    /// An edge or entry point references a node that was never added
    #[error("node `{0}` is not defined in the graph")]
    UnknownNode(String),

    /// The graph failed structural validation
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// Checkpoint persistence failed
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// A node failed in a way it could not record in state
    #[error("node `{node}` failed: {message}")]
    Node { node: String, message: String },
}

impl EngineError {
    /// Helper for node executors that need to surface a fatal failure.
    pub fn node(node: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Node {
            node: node.into(),
            message: message.into(),
        }
    }
}
