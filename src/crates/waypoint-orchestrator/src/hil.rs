//! Human-in-the-loop gate
//!
//! The gate sits inside the graph as a node but owns the full pause
//! protocol: evaluate the predicate, create the approval request, write
//! the pause checkpoint, flip the session to `pending_approval`, and halt
//! the turn. The approve/reject half runs outside any turn - it decides
//! the stored request, merges the decision into the checkpointed state,
//! and hands the state back for resume.

use crate::db::models::{ApprovalRecord, SessionStatus};
use crate::db::repositories::{ApprovalRepository, SessionRepository};
use crate::db::{DatabaseConnection, DatabaseError};
use crate::workflow::{HilDecision, WorkflowState};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use waypoint_checkpoint::{CheckpointError, CheckpointMetadata, CheckpointPhase, CheckpointStore};

/// Composable pause predicate over workflow state.
pub type ApprovalPredicate = Arc<dyn Fn(&WorkflowState) -> bool + Send + Sync>;

/// Errors from gate operations
#[derive(Error, Debug)]
pub enum HilError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No pending approval exists for the session
    #[error("no pending approval for session {0}")]
    NoPendingApproval(String),
}

/// Outcome of running the gate inside a turn.
pub enum HilOutcome {
    /// Approval not required; execution continues
    Continue(WorkflowState),
    /// Turn suspended; the state carries `_halt` and the pending envelope
    Pending {
        state: WorkflowState,
        approval: ApprovalRecord,
        checkpoint_id: String,
    },
}

/// Gate configuration plus the stores it writes through.
pub struct HilGate {
    node_id: String,
    approval_message: String,
    predicate: ApprovalPredicate,
    auto_approve: bool,
    timeout_seconds: i64,
    db: DatabaseConnection,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl HilGate {
    pub fn new(
        node_id: impl Into<String>,
        approval_message: impl Into<String>,
        predicate: ApprovalPredicate,
        auto_approve: bool,
        timeout_seconds: i64,
        db: DatabaseConnection,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            approval_message: approval_message.into(),
            predicate,
            auto_approve,
            timeout_seconds,
            db,
            checkpoints,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Run the gate for the current turn.
    pub async fn execute(&self, mut state: WorkflowState) -> Result<HilOutcome, HilError> {
        let already_approved = state.approved();

        if self.auto_approve || already_approved || !(self.predicate)(&state) {
            if state.hil_decision.is_none() {
                state.hil_decision = Some(HilDecision::auto_approved());
            }
            tracing::debug!(node = %self.node_id, "approval not required, continuing");
            return Ok(HilOutcome::Continue(state));
        }

        let session_id = state
            .session_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let request_data = match &state.request_data {
            Some(payload) => serde_json::to_value(payload)?,
            None => json!({}),
        };

        let approval = ApprovalRecord::new(
            &session_id,
            "banking",
            &request_data,
            state.amount,
            state.recipient.clone(),
            self.timeout_seconds,
        )?;
        ApprovalRepository::create(self.db.pool(), &approval).await?;

        let paused_at = Utc::now().to_rfc3339();

        // Pending envelope becomes the turn's response before the snapshot,
        // so the checkpoint carries everything needed to resume or inspect.
        state.needs_approval = true;
        state.halt = true;
        state.response = Some(json!({
            "status": "PENDING_APPROVAL",
            "message": self.approval_message,
            "session_id": session_id,
            "approval_id": approval.approval_id,
            "node_id": self.node_id,
            "amount": state.amount,
            "recipient": state.recipient,
            "paused_at": paused_at,
        }));

        let metadata = CheckpointMetadata::new(CheckpointPhase::Pause)
            .with_extra("approval_id", json!(approval.approval_id))
            .with_extra("approval_message", json!(self.approval_message))
            .with_extra("paused_at", json!(paused_at))
            .with_extra("user_id", json!(state.user_id));

        let checkpoint_id = self
            .checkpoints
            .save(
                &session_id,
                &self.node_id,
                serde_json::to_value(&state)?,
                metadata,
            )
            .await?;

        if let Some(envelope) = state.response.as_mut().and_then(|r| r.as_object_mut()) {
            envelope.insert("checkpoint_id".to_string(), json!(checkpoint_id));
        }

        let mut session = SessionRepository::get_required(self.db.pool(), &session_id).await?;
        session.set_status(SessionStatus::PendingApproval)?;
        session.current_node = Some(self.node_id.clone());
        SessionRepository::save(self.db.pool(), &session).await?;

        tracing::info!(
            %session_id,
            approval_id = %approval.approval_id,
            amount = ?state.amount,
            "workflow paused for approval"
        );

        Ok(HilOutcome::Pending {
            state,
            approval,
            checkpoint_id,
        })
    }

    /// Approve the session's pending request and return the restored
    /// state, decision merged, ready for resume.
    pub async fn approve(
        &self,
        session_id: &str,
        approver_id: &str,
        reason: Option<&str>,
    ) -> Result<WorkflowState, HilError> {
        let approval = ApprovalRepository::find_pending_for_session(self.db.pool(), session_id)
            .await?
            .ok_or_else(|| HilError::NoPendingApproval(session_id.to_string()))?;

        ApprovalRepository::approve(self.db.pool(), &approval.approval_id, approver_id, reason)
            .await?;

        let mut state = self.restore_paused_state(session_id).await?;
        state.hil_decision = Some(HilDecision::by(
            true,
            approver_id,
            reason.map(str::to_string),
        ));
        state.halt = false;
        state.response = None;

        self.checkpoints
            .save(
                session_id,
                &self.node_id,
                serde_json::to_value(&state)?,
                CheckpointMetadata::new(CheckpointPhase::Approved)
                    .with_extra("approval_id", json!(approval.approval_id))
                    .with_extra("approver_id", json!(approver_id)),
            )
            .await?;

        tracing::info!(session_id, approver_id, "approval granted");
        Ok(state)
    }

    /// Reject the session's pending request. The workflow does not resume.
    pub async fn reject(
        &self,
        session_id: &str,
        approver_id: &str,
        reason: &str,
    ) -> Result<ApprovalRecord, HilError> {
        let approval = ApprovalRepository::find_pending_for_session(self.db.pool(), session_id)
            .await?
            .ok_or_else(|| HilError::NoPendingApproval(session_id.to_string()))?;

        let decided =
            ApprovalRepository::reject(self.db.pool(), &approval.approval_id, approver_id, reason)
                .await?;

        let mut state = self.restore_paused_state(session_id).await?;
        state.hil_decision = Some(HilDecision::by(
            false,
            approver_id,
            Some(reason.to_string()),
        ));

        self.checkpoints
            .save(
                session_id,
                &self.node_id,
                serde_json::to_value(&state)?,
                CheckpointMetadata::new(CheckpointPhase::Rejected)
                    .with_extra("approval_id", json!(approval.approval_id))
                    .with_extra("approver_id", json!(approver_id))
                    .with_extra("reason", json!(reason)),
            )
            .await?;

        tracing::info!(session_id, approver_id, reason, "approval rejected");
        Ok(decided)
    }

    async fn restore_paused_state(&self, session_id: &str) -> Result<WorkflowState, HilError> {
        let checkpoint = self
            .checkpoints
            .load_latest(session_id)
            .await?
            .ok_or_else(|| {
                CheckpointError::NotFound(format!("no checkpoint for session {session_id}"))
            })?;

        if checkpoint.metadata.phase != CheckpointPhase::Pause {
            tracing::warn!(
                session_id,
                phase = checkpoint.metadata.phase.as_str(),
                "latest checkpoint is not a pause snapshot"
            );
        }

        Ok(WorkflowState::from_snapshot(checkpoint.state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SessionRecord;
    use crate::workflow::TransferPayload;
    use waypoint_checkpoint::MemoryCheckpointStore;

    async fn gate_with(threshold: f64) -> (HilGate, DatabaseConnection, Arc<MemoryCheckpointStore>) {
        let db = DatabaseConnection::new_in_memory().await.unwrap();
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let gate = HilGate::new(
            "money_transfer_hil",
            "Transfer requires approval",
            Arc::new(move |state: &WorkflowState| {
                state.amount.map(|a| a >= threshold).unwrap_or(false) || state.needs_approval
            }),
            false,
            3600,
            db.clone(),
            checkpoints.clone(),
        );
        (gate, db, checkpoints)
    }

    fn transfer_state(session_id: &str, amount: f64) -> WorkflowState {
        let mut state = WorkflowState::for_turn(
            format!("Transfer {amount} to kiran"),
            "u1",
            session_id,
        );
        state.amount = Some(amount);
        state.recipient = Some("kiran".to_string());
        state.request_data = Some(TransferPayload {
            from_account: "123".to_string(),
            to_account: "kiran".to_string(),
            amount,
        });
        state
    }

    async fn seed_session(db: &DatabaseConnection) -> SessionRecord {
        let session = SessionRecord::new("u1", "banking");
        SessionRepository::create(db.pool(), &session).await.unwrap();
        session
    }

    #[tokio::test]
    async fn below_threshold_continues_with_auto_decision() {
        let (gate, db, checkpoints) = gate_with(5000.0).await;
        let session = seed_session(&db).await;

        let outcome = gate
            .execute(transfer_state(&session.session_id, 4999.99))
            .await
            .unwrap();

        match outcome {
            HilOutcome::Continue(state) => {
                let decision = state.hil_decision.unwrap();
                assert!(decision.approved);
                assert!(decision.auto);
            }
            HilOutcome::Pending { .. } => panic!("should not pause below threshold"),
        }
        assert_eq!(checkpoints.total().await, 0);
    }

    #[tokio::test]
    async fn at_threshold_pauses_with_approval_and_checkpoint() {
        let (gate, db, checkpoints) = gate_with(5000.0).await;
        let session = seed_session(&db).await;

        let outcome = gate
            .execute(transfer_state(&session.session_id, 5000.0))
            .await
            .unwrap();

        let (state, approval) = match outcome {
            HilOutcome::Pending { state, approval, .. } => (state, approval),
            HilOutcome::Continue(_) => panic!("threshold amount must pause"),
        };

        assert!(state.halt);
        assert_eq!(state.response_status(), Some("PENDING_APPROVAL"));
        assert_eq!(approval.amount, Some(5000.0));

        let latest = checkpoints
            .load_latest(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.metadata.phase, CheckpointPhase::Pause);

        let stored = SessionRepository::get_required(db.pool(), &session.session_id)
            .await
            .unwrap();
        assert_eq!(stored.status().unwrap(), SessionStatus::PendingApproval);
    }

    #[tokio::test]
    async fn approve_merges_decision_and_writes_checkpoint() {
        let (gate, db, checkpoints) = gate_with(5000.0).await;
        let session = seed_session(&db).await;
        gate.execute(transfer_state(&session.session_id, 6000.0))
            .await
            .unwrap();

        let state = gate
            .approve(&session.session_id, "m1", Some("verified"))
            .await
            .unwrap();

        assert!(state.approved());
        assert!(!state.halt);
        let decision = state.hil_decision.unwrap();
        assert_eq!(decision.approver_id.as_deref(), Some("m1"));
        assert!(!decision.auto);

        let latest = checkpoints
            .load_latest(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.metadata.phase, CheckpointPhase::Approved);
    }

    #[tokio::test]
    async fn reject_terminates_without_unlocking_state() {
        let (gate, db, checkpoints) = gate_with(5000.0).await;
        let session = seed_session(&db).await;
        gate.execute(transfer_state(&session.session_id, 6000.0))
            .await
            .unwrap();

        let decided = gate
            .reject(&session.session_id, "m1", "risk")
            .await
            .unwrap();
        assert_eq!(decided.rejection_reason.as_deref(), Some("risk"));

        let latest = checkpoints
            .load_latest(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.metadata.phase, CheckpointPhase::Rejected);

        let restored = WorkflowState::from_snapshot(latest.state).unwrap();
        assert!(!restored.approved());
    }

    #[tokio::test]
    async fn approve_without_pending_request_fails() {
        let (gate, db, _) = gate_with(5000.0).await;
        let session = seed_session(&db).await;

        let err = gate.approve(&session.session_id, "m1", None).await.unwrap_err();
        assert!(matches!(err, HilError::NoPendingApproval(_)));
    }

    #[tokio::test]
    async fn conversational_flag_pauses_even_below_threshold() {
        let (gate, db, _) = gate_with(5000.0).await;
        let session = seed_session(&db).await;

        let mut state = transfer_state(&session.session_id, 1000.0);
        state.needs_approval = true;
        state.approval_reason = Some("conversational completion".to_string());

        let outcome = gate.execute(state).await.unwrap();
        assert!(matches!(outcome, HilOutcome::Pending { .. }));
    }
}
