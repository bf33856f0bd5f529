//! State contract between the engine and workflow state types

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Behavior the engine needs from a workflow state.
///
/// The engine treats state as opaque apart from two touch points: the halt
/// flag (raised by a node to end the turn cooperatively) and the execution
/// history (the ordered list of node ids run this turn). Everything else -
/// field layout, domain meaning - belongs to the workflow that defines the
/// state type.
pub trait FlowState:
    Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// True when a node has asked the engine to stop propagating.
    fn is_halted(&self) -> bool;

    /// Record that a node finished executing.
    fn record_node(&mut self, node_id: &str);
}
