//! Checkpoint record and metadata types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle phase a checkpoint was taken at.
///
/// `Start` and `End` bracket node execution, `Pause` marks a
/// human-in-the-loop suspension, and `Approved` / `Rejected` record the
/// decision that unlocked (or terminated) the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointPhase {
    Start,
    End,
    Pause,
    Approved,
    Rejected,
}

impl CheckpointPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointPhase::Start => "start",
            CheckpointPhase::End => "end",
            CheckpointPhase::Pause => "pause",
            CheckpointPhase::Approved => "approved",
            CheckpointPhase::Rejected => "rejected",
        }
    }
}

/// Free-form metadata attached to a checkpoint.
///
/// The phase is always present; everything else (approval ids, pause
/// timestamps, approver ids) rides along in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Phase of node execution this checkpoint belongs to
    pub phase: CheckpointPhase,

    /// Additional metadata keys
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CheckpointMetadata {
    /// Create metadata for the given phase
    pub fn new(phase: CheckpointPhase) -> Self {
        Self {
            phase,
            extra: BTreeMap::new(),
        }
    }

    /// Attach an extra metadata entry
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A single durable snapshot of workflow state.
///
/// Records are append-only: within a session, `created_at` (tie-broken by
/// insertion order in every backend) gives a strict total order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Unique checkpoint identifier (UUID string)
    pub checkpoint_id: String,

    /// Session this checkpoint belongs to
    pub session_id: String,

    /// Node that produced the snapshot
    pub node_id: String,

    /// Serialized workflow state
    pub state: serde_json::Value,

    /// Phase and free-form metadata
    pub metadata: CheckpointMetadata,

    /// Server-assigned creation timestamp
    pub created_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// Build a new record with a fresh id and the current timestamp.
    pub fn new(
        session_id: impl Into<String>,
        node_id: impl Into<String>,
        state: serde_json::Value,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            checkpoint_id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            node_id: node_id.into(),
            state,
            metadata,
            created_at: Utc::now(),
        }
    }
}
