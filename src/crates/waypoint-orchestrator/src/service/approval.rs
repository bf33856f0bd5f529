//! Approval decisions and resume

use super::{ApprovalReply, ServiceError, WorkflowService};
use crate::db::models::{ConversationMessage, MessageRole, SessionStatus};
use crate::db::repositories::SessionRepository;
use crate::workflow::resume_node_after_gate;
use serde_json::json;

impl WorkflowService {
    /// Decide a pending approval. On approve, resume the workflow at the
    /// post-gate node and return the final result; on reject, terminate.
    pub async fn decide_approval(
        &self,
        session_id: &str,
        approver_id: &str,
        approved: bool,
        reason: Option<&str>,
    ) -> Result<ApprovalReply, ServiceError> {
        SessionRepository::get(self.db.pool(), session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("session {session_id} not found")))?;

        let lock = self.session_lock(session_id);
        let _turn = lock.lock().await;

        // Re-read under the lock so a racing decision is seen.
        let session = SessionRepository::get_required(self.db.pool(), session_id).await?;
        let status = session.status()?;
        if status != SessionStatus::PendingApproval {
            return Err(ServiceError::Conflict(format!(
                "session is not pending approval (status: {status})"
            )));
        }

        if approved {
            self.approve_and_resume(session_id, approver_id, reason).await
        } else {
            self.reject(session_id, approver_id, reason).await
        }
    }

    async fn approve_and_resume(
        &self,
        session_id: &str,
        approver_id: &str,
        reason: Option<&str>,
    ) -> Result<ApprovalReply, ServiceError> {
        let state = self.gate.approve(session_id, approver_id, reason).await?;

        // The resume precondition: never re-enter the graph without an
        // affirmative decision in state.
        if !state.approved() {
            return Err(ServiceError::Conflict(
                "approval decision missing from restored state".to_string(),
            ));
        }

        let mut session = SessionRepository::get_required(self.db.pool(), session_id).await?;
        session.set_status(SessionStatus::Approved)?;
        session.push_message(
            ConversationMessage::new(
                MessageRole::System,
                format!("Transfer approved by {approver_id}"),
            )
            .with_metadata(json!({"approver_id": approver_id})),
        )?;
        SessionRepository::save(self.db.pool(), &session).await?;

        // Re-enter at the branch of the intent that was held: execution
        // for transfers, the classified branch for low-confidence holds.
        let resume_node = resume_node_after_gate(&state);
        let final_state = match self.engine.resume(session_id, resume_node, state).await {
            Ok(state) => state,
            Err(err) => {
                self.mark_failed(session_id).await;
                return Err(err.into());
            }
        };

        let mut session = SessionRepository::get_required(self.db.pool(), session_id).await?;
        session.set_status(SessionStatus::Completed)?;
        session.current_node = final_state.execution_history.last().cloned();
        session.set_state_value(&serde_json::to_value(&final_state)?)?;
        SessionRepository::save(self.db.pool(), &session).await?;

        tracing::info!(session_id, approver_id, "workflow resumed to completion");

        Ok(ApprovalReply::Approved {
            status: "approved".to_string(),
            session_id: session_id.to_string(),
            result: final_state.response.unwrap_or_default(),
            approved_by: approver_id.to_string(),
        })
    }

    async fn reject(
        &self,
        session_id: &str,
        approver_id: &str,
        reason: Option<&str>,
    ) -> Result<ApprovalReply, ServiceError> {
        let reason = reason.unwrap_or("Rejected by approver");
        self.gate.reject(session_id, approver_id, reason).await?;

        let mut session = SessionRepository::get_required(self.db.pool(), session_id).await?;
        session.set_status(SessionStatus::Rejected)?;
        session.push_message(
            ConversationMessage::new(
                MessageRole::System,
                format!("Transfer rejected by {approver_id}: {reason}"),
            )
            .with_metadata(json!({"approver_id": approver_id, "reason": reason})),
        )?;
        SessionRepository::save(self.db.pool(), &session).await?;

        Ok(ApprovalReply::Rejected {
            status: "rejected".to_string(),
            session_id: session_id.to_string(),
            reason: reason.to_string(),
            rejected_by: approver_id.to_string(),
        })
    }
}
