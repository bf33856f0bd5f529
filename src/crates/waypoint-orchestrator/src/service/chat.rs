//! Chat turn orchestration

use super::{ChatReply, ServiceError, WorkflowService};
use crate::db::models::{ConversationMessage, MessageRole, SessionRecord, SessionStatus};
use crate::db::repositories::SessionRepository;
use crate::workflow::WorkflowState;
use chrono::{DateTime, Utc};
use serde_json::json;

/// Identical-message replays inside this window return the previous
/// turn's result instead of re-executing (no second downstream call).
const REPLAY_WINDOW_SECONDS: i64 = 60;

impl WorkflowService {
    /// Run one chat turn: load or create the session, execute the graph,
    /// and map the outcome (terminal, pending approval, or clarification).
    pub async fn chat(
        &self,
        message: &str,
        session_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<ChatReply, ServiceError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ServiceError::Validation(
                "message must not be empty".to_string(),
            ));
        }
        let user_id = user_id.unwrap_or("default_user");

        let session = self.load_or_create_session(session_id, user_id).await?;
        let lock = self.session_lock(&session.session_id);
        let _turn = lock.lock().await;

        // Re-read under the lock; a queued concurrent turn may have
        // advanced the session while this one waited.
        let mut session =
            SessionRepository::get_required(self.db.pool(), &session.session_id).await?;

        if let Some(reply) = self.replayed_turn(&session, message)? {
            tracing::info!(session_id = %session.session_id, "duplicate message, returning cached result");
            return Ok(reply);
        }

        match session.status()? {
            SessionStatus::Active => {}
            SessionStatus::PendingApproval => {
                return Err(ServiceError::Conflict(
                    "session is awaiting approval; decide it before sending new messages"
                        .to_string(),
                ));
            }
            terminal => {
                return Err(ServiceError::Conflict(format!(
                    "session is {terminal}; start a new session"
                )));
            }
        }

        session.increment_execution();
        session.push_message(ConversationMessage::new(MessageRole::User, message))?;
        SessionRepository::save(self.db.pool(), &session).await?;

        let state = self.seed_state(&session, message, user_id)?;

        let final_state = match self.engine.invoke(&session.session_id, state).await {
            Ok(state) => state,
            Err(err) => {
                self.mark_failed(&session.session_id).await;
                return Err(err.into());
            }
        };

        self.finish_turn(&session.session_id, final_state).await
    }

    async fn load_or_create_session(
        &self,
        session_id: Option<&str>,
        user_id: &str,
    ) -> Result<SessionRecord, ServiceError> {
        if let Some(id) = session_id {
            if let Some(session) = SessionRepository::get(self.db.pool(), id).await? {
                return Ok(session);
            }
            tracing::warn!(session_id = id, "unknown session id, creating a new session");
        }

        let session = SessionRecord::new(user_id, "banking");
        SessionRepository::create(self.db.pool(), &session).await?;
        Ok(session)
    }

    /// Duplicate detection: the same content as the previous user turn on
    /// a completed session, within the replay window, is answered from
    /// the stored result without re-executing the graph.
    fn replayed_turn(
        &self,
        session: &SessionRecord,
        message: &str,
    ) -> Result<Option<ChatReply>, ServiceError> {
        if session.status()? != SessionStatus::Completed {
            return Ok(None);
        }
        let last = match session.last_user_message()? {
            Some(last) if last.content == message => last,
            _ => return Ok(None),
        };

        let fresh = DateTime::parse_from_rfc3339(&last.timestamp)
            .map(|ts| (Utc::now() - ts.with_timezone(&Utc)).num_seconds() < REPLAY_WINDOW_SECONDS)
            .unwrap_or(false);
        if !fresh {
            return Ok(None);
        }

        let state = WorkflowState::from_snapshot(session.state_value()?)?;
        Ok(state.response.map(|reply| ChatReply {
            reply,
            session_id: session.session_id.clone(),
            status: None,
            execution_history: state.execution_history,
        }))
    }

    fn seed_state(
        &self,
        session: &SessionRecord,
        message: &str,
        user_id: &str,
    ) -> Result<WorkflowState, ServiceError> {
        let mut state = WorkflowState::for_turn(message, user_id, &session.session_id);

        // Carry forward a partial transfer from the previous turn.
        let previous = WorkflowState::from_snapshot(session.state_value()?)?;
        if previous.awaiting_completion {
            state.awaiting_completion = true;
            state.context_amount = previous.context_amount;
            state.context_recipient = previous.context_recipient;
            tracing::info!(
                context_amount = ?state.context_amount,
                context_recipient = ?state.context_recipient,
                "carrying conversational context forward"
            );
        }

        Ok(state)
    }

    async fn finish_turn(
        &self,
        session_id: &str,
        state: WorkflowState,
    ) -> Result<ChatReply, ServiceError> {
        // The gate may have updated the session row mid-turn; reload
        // before applying this turn's results.
        let mut session = SessionRepository::get_required(self.db.pool(), session_id).await?;
        session.current_node = state.execution_history.last().cloned();

        let reply = match state.response_status() {
            Some("PENDING_APPROVAL") => {
                let reply = ChatReply {
                    reply: state.response.clone().unwrap_or_default(),
                    session_id: session_id.to_string(),
                    status: Some("PENDING_APPROVAL".to_string()),
                    execution_history: Vec::new(),
                };
                session.set_state_value(&serde_json::to_value(&state)?)?;
                SessionRepository::save(self.db.pool(), &session).await?;
                reply
            }
            Some("awaiting_info") => {
                let question = state
                    .response
                    .as_ref()
                    .and_then(|r| r.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("Could you give me a bit more detail?")
                    .to_string();
                session.push_message(ConversationMessage::new(MessageRole::Assistant, question))?;
                session.set_state_value(&serde_json::to_value(&state)?)?;
                SessionRepository::save(self.db.pool(), &session).await?;

                ChatReply {
                    reply: state.response.clone().unwrap_or_default(),
                    session_id: session_id.to_string(),
                    status: Some("awaiting_info".to_string()),
                    execution_history: state.execution_history.clone(),
                }
            }
            _ => {
                // Terminal: success or a captured failure. Either way the
                // engine finished, so the session completes.
                let reply_value = match (&state.response, &state.error) {
                    (Some(response), _) => response.clone(),
                    (None, Some(error)) => json!({"error": error}),
                    (None, None) => json!({}),
                };

                session.set_status(SessionStatus::Completed)?;
                session.push_message(ConversationMessage::new(
                    MessageRole::Assistant,
                    reply_value.to_string(),
                ))?;
                session.set_state_value(&serde_json::to_value(&state)?)?;
                SessionRepository::save(self.db.pool(), &session).await?;

                ChatReply {
                    reply: reply_value,
                    session_id: session_id.to_string(),
                    status: None,
                    execution_history: state.execution_history.clone(),
                }
            }
        };

        Ok(reply)
    }

    pub(crate) async fn mark_failed(&self, session_id: &str) {
        let result = async {
            let mut session = SessionRepository::get_required(self.db.pool(), session_id).await?;
            session.set_status(SessionStatus::Failed)?;
            SessionRepository::save(self.db.pool(), &session).await
        }
        .await;

        if let Err(err) = result {
            tracing::error!(session_id, %err, "failed to mark session as failed");
        }
    }
}
