//! The banking workflow: state schema, entity extraction, graph definition

pub mod extract;
pub mod graph;
pub mod state;

pub use graph::{build_banking_graph, resume_node_after_gate, BankingDeps, NODE_HIL};
pub use state::{HilDecision, Intent, TransferPayload, WorkflowState};
