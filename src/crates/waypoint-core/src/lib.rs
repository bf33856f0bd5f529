//! Graph execution engine for durable conversational workflows
//!
//! A workflow is a directed graph of async nodes over a mutable session
//! state. The engine invokes one node at a time, persists checkpoints at
//! node boundaries through a [`CheckpointStore`](waypoint_checkpoint::CheckpointStore),
//! follows direct or conditional edges, and stops early when the state
//! raises its halt flag - which is how human-in-the-loop gates end a turn
//! without ending the session. A suspended session is re-entered later via
//! [`GraphEngine::resume`] at an explicit node.
//!
//! # Building and running a graph
//!
//! ```rust,ignore
//! use waypoint_core::{Graph, GraphEngine, NodeSpec, CheckpointPolicy, node_fn, END};
//!
//! let mut graph = Graph::new("greet");
//! graph.add_node(NodeSpec::new(
//!     "greet",
//!     node_fn(|mut state: MyState| async move {
//!         state.reply = Some("hello".into());
//!         Ok(state)
//!     }),
//!     CheckpointPolicy::End,
//! ));
//! graph.add_edge("greet", END);
//! graph.validate()?;
//!
//! let engine = GraphEngine::new(graph, checkpoints);
//! let final_state = engine.invoke("session-1", initial_state).await?;
//! ```
//!
//! Conditional edges route through a pure selector - the selector borrows
//! the state immutably, so a selector cannot smuggle writes into the run.

pub mod engine;
pub mod error;
pub mod graph;
pub mod state;

pub use engine::GraphEngine;
pub use error::{EngineError, Result};
pub use graph::{node_fn, CheckpointPolicy, Edge, Graph, NodeExecutor, NodeSpec, END, START};
pub use state::FlowState;
