//! Database models

pub mod approval;
pub mod session;

pub use approval::{ApprovalRecord, ApprovalStatus};
pub use session::{ConversationMessage, MessageRole, SessionRecord, SessionStatus};
