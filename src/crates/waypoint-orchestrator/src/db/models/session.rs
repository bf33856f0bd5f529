//! Session model and status state machine
//!
//! A session is the per-conversation container: status, conversation
//! history, the workflow state carried between turns, and the execution
//! counter used for idempotency tracking. Timestamps are ISO-8601 TEXT
//! columns (SQLite has no native datetime type).

use crate::db::error::{DatabaseError, DbResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::fmt;

/// Session lifecycle status.
///
/// Transitions (initial = `Active` on create):
///
/// ```text
/// active           -> pending_approval | completed | failed
/// pending_approval -> approved | rejected | timeout
/// approved         -> completed | failed
/// rejected / completed / failed / timeout -> (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    PendingApproval,
    Approved,
    Rejected,
    Completed,
    Failed,
    Timeout,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::PendingApproval => "pending_approval",
            SessionStatus::Approved => "approved",
            SessionStatus::Rejected => "rejected",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Timeout => "timeout",
        }
    }

    pub fn parse(value: &str) -> DbResult<Self> {
        match value {
            "active" => Ok(SessionStatus::Active),
            "pending_approval" => Ok(SessionStatus::PendingApproval),
            "approved" => Ok(SessionStatus::Approved),
            "rejected" => Ok(SessionStatus::Rejected),
            "completed" => Ok(SessionStatus::Completed),
            "failed" => Ok(SessionStatus::Failed),
            "timeout" => Ok(SessionStatus::Timeout),
            other => Err(DatabaseError::InvalidValue(format!(
                "unknown session status `{other}`"
            ))),
        }
    }

    /// True for states with no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Rejected
                | SessionStatus::Completed
                | SessionStatus::Failed
                | SessionStatus::Timeout
        )
    }

    /// Whether `self -> to` is a legal transition. Same-state is a no-op
    /// and always allowed.
    pub fn can_transition(&self, to: SessionStatus) -> bool {
        if *self == to {
            return true;
        }
        match self {
            SessionStatus::Active => matches!(
                to,
                SessionStatus::PendingApproval | SessionStatus::Completed | SessionStatus::Failed
            ),
            SessionStatus::PendingApproval => matches!(
                to,
                SessionStatus::Approved | SessionStatus::Rejected | SessionStatus::Timeout
            ),
            SessionStatus::Approved => {
                matches!(to, SessionStatus::Completed | SessionStatus::Failed)
            }
            _ => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a conversation participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A single message in a session's conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now().to_rfc3339(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A workflow session row.
///
/// `conversation_history` and `workflow_state` are JSON TEXT columns;
/// use the typed accessors instead of touching the raw strings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRecord {
    /// Unique session identifier (UUID string)
    pub session_id: String,

    /// Owning user
    pub user_id: String,

    /// Workflow this session runs (e.g. "banking")
    pub workflow_type: String,

    /// Current lifecycle status (see [`SessionStatus`])
    pub status: String,

    /// Most recently entered graph node
    pub current_node: Option<String>,

    /// Accepted chat turns so far; the idempotency indicator
    pub execution_count: i64,

    /// JSON list of [`ConversationMessage`]
    pub conversation_history: String,

    /// JSON workflow state carried between turns
    pub workflow_state: String,

    /// Creation timestamp (ISO-8601)
    pub created_at: String,

    /// Last update timestamp (ISO-8601)
    pub updated_at: String,
}

impl SessionRecord {
    /// Create a fresh `active` session.
    pub fn new(user_id: impl Into<String>, workflow_type: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            workflow_type: workflow_type.into(),
            status: SessionStatus::Active.as_str().to_string(),
            current_node: None,
            execution_count: 0,
            conversation_history: "[]".to_string(),
            workflow_state: "{}".to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn status(&self) -> DbResult<SessionStatus> {
        SessionStatus::parse(&self.status)
    }

    /// Apply a validated status transition.
    pub fn set_status(&mut self, to: SessionStatus) -> DbResult<()> {
        let from = self.status()?;
        if !from.can_transition(to) {
            return Err(DatabaseError::Conflict(format!(
                "illegal session transition {from} -> {to}"
            )));
        }
        self.status = to.as_str().to_string();
        self.touch();
        Ok(())
    }

    pub fn history(&self) -> DbResult<Vec<ConversationMessage>> {
        Ok(serde_json::from_str(&self.conversation_history)?)
    }

    /// Append a message to the conversation history.
    pub fn push_message(&mut self, message: ConversationMessage) -> DbResult<()> {
        let mut history = self.history()?;
        history.push(message);
        self.conversation_history = serde_json::to_string(&history)?;
        self.touch();
        Ok(())
    }

    /// The most recent user message, if any.
    pub fn last_user_message(&self) -> DbResult<Option<ConversationMessage>> {
        Ok(self
            .history()?
            .into_iter()
            .rev()
            .find(|m| m.role == MessageRole::User))
    }

    pub fn state_value(&self) -> DbResult<Value> {
        Ok(serde_json::from_str(&self.workflow_state)?)
    }

    pub fn set_state_value(&mut self, state: &Value) -> DbResult<()> {
        self.workflow_state = serde_json::to_string(state)?;
        self.touch();
        Ok(())
    }

    /// Count one accepted inbound message.
    pub fn increment_execution(&mut self) {
        self.execution_count += 1;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().to_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_sessions_start_active() {
        let session = SessionRecord::new("u1", "banking");
        assert_eq!(session.status().unwrap(), SessionStatus::Active);
        assert_eq!(session.execution_count, 0);
        assert!(session.history().unwrap().is_empty());
    }

    #[test]
    fn legal_transitions_are_accepted() {
        let mut session = SessionRecord::new("u1", "banking");
        session.set_status(SessionStatus::PendingApproval).unwrap();
        session.set_status(SessionStatus::Approved).unwrap();
        session.set_status(SessionStatus::Completed).unwrap();
        assert!(session.status().unwrap().is_terminal());
    }

    #[test]
    fn terminal_states_reject_transitions() {
        let mut session = SessionRecord::new("u1", "banking");
        session.set_status(SessionStatus::Completed).unwrap();
        let err = session.set_status(SessionStatus::Active).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn pending_cannot_jump_to_completed() {
        let mut session = SessionRecord::new("u1", "banking");
        session.set_status(SessionStatus::PendingApproval).unwrap();
        assert!(session.set_status(SessionStatus::Completed).is_err());
    }

    #[test]
    fn same_state_transition_is_a_noop() {
        let mut session = SessionRecord::new("u1", "banking");
        session.set_status(SessionStatus::Active).unwrap();
        assert_eq!(session.status().unwrap(), SessionStatus::Active);
    }

    #[test]
    fn history_appends_in_order() {
        let mut session = SessionRecord::new("u1", "banking");
        session
            .push_message(ConversationMessage::new(MessageRole::User, "hello"))
            .unwrap();
        session
            .push_message(
                ConversationMessage::new(MessageRole::Assistant, "hi")
                    .with_metadata(json!({"intent": "greeting"})),
            )
            .unwrap();

        let history = session.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hello");
        assert_eq!(
            session.last_user_message().unwrap().unwrap().content,
            "hello"
        );
    }
}
