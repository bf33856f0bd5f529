//! Service layer: orchestrates sessions, the engine, and the gate
//!
//! Handlers stay thin; everything stateful happens here. A per-session
//! async mutex serializes turns and resumes for one session while letting
//! sessions run in parallel.

pub mod approval;
pub mod chat;

use crate::bank::BankClient;
use crate::classifier::IntentClassifier;
use crate::config::ServerConfig;
use crate::db::models::{ApprovalRecord, ConversationMessage, SessionRecord};
use crate::db::repositories::{ApprovalRepository, SessionRepository};
use crate::db::{DatabaseConnection, DatabaseError};
use crate::hil::{HilError, HilGate};
use crate::workflow::{build_banking_graph, BankingDeps, WorkflowState, NODE_HIL};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use waypoint_checkpoint::CheckpointStore;
use waypoint_core::{EngineError, GraphEngine};

/// Errors surfaced by the service layer
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed request; no session state was touched
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Hil(#[from] HilError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of one chat turn
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub reply: Value,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub execution_history: Vec<String>,
}

/// Result of an approval decision
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ApprovalReply {
    Approved {
        status: String,
        session_id: String,
        result: Value,
        approved_by: String,
    },
    Rejected {
        status: String,
        session_id: String,
        reason: String,
        rejected_by: String,
    },
}

/// Session summary for the list endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub workflow_type: String,
    pub status: String,
    pub execution_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&SessionRecord> for SessionSummary {
    fn from(session: &SessionRecord) -> Self {
        Self {
            session_id: session.session_id.clone(),
            user_id: session.user_id.clone(),
            workflow_type: session.workflow_type.clone(),
            status: session.status.clone(),
            execution_count: session.execution_count,
            created_at: session.created_at.clone(),
            updated_at: session.updated_at.clone(),
        }
    }
}

/// Full session status view
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatusView {
    pub session_id: String,
    pub user_id: String,
    pub status: String,
    pub current_node: Option<String>,
    pub execution_count: i64,
    pub checkpoints: usize,
    pub conversation_history: Vec<ConversationMessage>,
    pub workflow_state: Value,
}

/// Checkpoint summary for the introspection endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointSummary {
    pub checkpoint_id: String,
    pub node_id: String,
    pub phase: String,
    pub created_at: String,
}

/// Pending approval view, request payload decoded
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalView {
    pub approval_id: String,
    pub session_id: String,
    pub workflow_type: String,
    pub request_data: Value,
    pub amount: Option<f64>,
    pub recipient: Option<String>,
    pub requested_at: String,
}

impl ApprovalView {
    fn try_from_record(record: &ApprovalRecord) -> Result<Self, ServiceError> {
        Ok(Self {
            approval_id: record.approval_id.clone(),
            session_id: record.session_id.clone(),
            workflow_type: record.workflow_type.clone(),
            request_data: record.request_value()?,
            amount: record.amount,
            recipient: record.recipient.clone(),
            requested_at: record.requested_at.clone(),
        })
    }
}

/// The orchestrator service: one instance per process, shared by handlers.
pub struct WorkflowService {
    pub(crate) db: DatabaseConnection,
    pub(crate) checkpoints: Arc<dyn CheckpointStore>,
    pub(crate) engine: GraphEngine<WorkflowState>,
    pub(crate) gate: Arc<HilGate>,
    pub(crate) config: ServerConfig,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WorkflowService {
    /// Wire the banking graph over the given stores and classifier.
    pub fn new(
        config: ServerConfig,
        db: DatabaseConnection,
        checkpoints: Arc<dyn CheckpointStore>,
        classifier: Arc<dyn IntentClassifier>,
    ) -> Result<Self, ServiceError> {
        let hil_threshold = config.hil.threshold;
        let gate = Arc::new(HilGate::new(
            NODE_HIL,
            format!("Transfer requires approval (threshold: {hil_threshold})"),
            Arc::new(move |state: &WorkflowState| {
                state.amount.map(|a| a >= hil_threshold).unwrap_or(false) || state.needs_approval
            }),
            config.hil.auto_approve,
            config.hil.timeout_seconds,
            db.clone(),
            checkpoints.clone(),
        ));

        let bank = BankClient::new(
            config.downstream.base_url.clone(),
            Duration::from_millis(config.downstream.timeout_ms),
        );

        let deps = Arc::new(BankingDeps {
            classifier,
            bank,
            gate: gate.clone(),
            confidence_threshold: config.confidence.threshold,
            hil_threshold,
        });

        let engine = GraphEngine::new(build_banking_graph(deps), checkpoints.clone())?;

        Ok(Self {
            db,
            checkpoints,
            engine,
            gate,
            config,
            locks: DashMap::new(),
        })
    }

    /// Per-session mutex; one turn or resume at a time per session.
    pub(crate) fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Session status + checkpoint count for the status endpoint.
    pub async fn session_status(&self, session_id: &str) -> Result<SessionStatusView, ServiceError> {
        let session = SessionRepository::get(self.db.pool(), session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("session {session_id} not found")))?;

        let checkpoints = self
            .checkpoints
            .count(session_id)
            .await
            .map_err(HilError::Checkpoint)?;

        Ok(SessionStatusView {
            session_id: session.session_id.clone(),
            user_id: session.user_id.clone(),
            status: session.status.clone(),
            current_node: session.current_node.clone(),
            execution_count: session.execution_count,
            checkpoints,
            conversation_history: session.history()?,
            workflow_state: session.state_value()?,
        })
    }

    /// Ordered checkpoint summaries for a session.
    pub async fn session_checkpoints(
        &self,
        session_id: &str,
    ) -> Result<Vec<CheckpointSummary>, ServiceError> {
        let records = self
            .checkpoints
            .list(session_id)
            .await
            .map_err(HilError::Checkpoint)?;

        Ok(records
            .into_iter()
            .map(|record| CheckpointSummary {
                checkpoint_id: record.checkpoint_id,
                node_id: record.node_id,
                phase: record.metadata.phase.as_str().to_string(),
                created_at: record.created_at.to_rfc3339(),
            })
            .collect())
    }

    /// All approval requests still pending.
    pub async fn pending_approvals(&self) -> Result<Vec<ApprovalView>, ServiceError> {
        ApprovalRepository::list_pending(self.db.pool())
            .await?
            .iter()
            .map(ApprovalView::try_from_record)
            .collect()
    }

    /// Session summaries, optionally filtered by user.
    pub async fn sessions(&self, user_id: Option<&str>) -> Result<Vec<SessionSummary>, ServiceError> {
        Ok(SessionRepository::list(self.db.pool(), user_id)
            .await?
            .iter()
            .map(SessionSummary::from)
            .collect())
    }
}
