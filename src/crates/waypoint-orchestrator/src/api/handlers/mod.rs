//! Endpoint handlers

mod approvals;
mod chat;
mod health;
mod sessions;
mod workflow;

pub use approvals::{approve_workflow, pending_approvals};
pub use chat::chat;
pub use health::health;
pub use sessions::list_sessions;
pub use workflow::{workflow_checkpoints, workflow_status};
