//! Workflow state for the banking graph
//!
//! One struct with explicit optional fields rather than an open map; this
//! is the complete surface the nodes read and write. `_halt` is the
//! engine's stop signal and `execution_history` the per-turn node trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use waypoint_core::FlowState;

/// Classified intent of a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BalanceInquiry,
    MoneyTransfer,
    AccountStatement,
    LoanInquiry,
    Fallback,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::BalanceInquiry => "balance_inquiry",
            Intent::MoneyTransfer => "money_transfer",
            Intent::AccountStatement => "account_statement",
            Intent::LoanInquiry => "loan_inquiry",
            Intent::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The decision recorded by the HIL gate (human or automatic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HilDecision {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// True when the gate approved without human involvement
    #[serde(default)]
    pub auto: bool,
    pub decided_at: DateTime<Utc>,
}

impl HilDecision {
    /// An automatic approval (below threshold / gate disabled).
    pub fn auto_approved() -> Self {
        Self {
            approved: true,
            approver_id: None,
            reason: None,
            auto: true,
            decided_at: Utc::now(),
        }
    }

    /// A human decision.
    pub fn by(approved: bool, approver_id: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            approved,
            approver_id: Some(approver_id.into()),
            reason,
            auto: false,
            decided_at: Utc::now(),
        }
    }
}

/// Downstream transfer payload. Field names match the banking service's
/// wire format, hence camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPayload {
    pub from_account: String,
    pub to_account: String,
    pub amount: f64,
}

/// Mutable per-session state threaded through the banking graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowState {
    /// Latest user utterance; required on turn entry
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,

    /// Classifier confidence in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_account: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,

    /// Prepared downstream payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<TransferPayload>,

    /// Carry-forward slot for multi-turn completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_amount: Option<f64>,

    /// Carry-forward slot for multi-turn completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_recipient: Option<String>,

    /// True while the assistant is waiting for a missing transfer slot
    pub awaiting_completion: bool,

    /// Raised when this turn must pass the HIL gate
    pub needs_approval: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hil_decision: Option<HilDecision>,

    /// Terminal result record for the turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,

    /// Recorded node failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Node ids executed this turn, in order
    pub execution_history: Vec<String>,

    /// Engine stop signal
    #[serde(rename = "_halt")]
    pub halt: bool,
}

impl WorkflowState {
    /// Fresh state for an inbound chat turn.
    pub fn for_turn(
        message: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            user_id: Some(user_id.into()),
            session_id: Some(session_id.into()),
            from_account: Some("123".to_string()),
            ..Default::default()
        }
    }

    /// Restore state from a checkpoint snapshot.
    ///
    /// Historical checkpoints sometimes stored a session envelope with the
    /// state under a `workflow_state` key; unwrap it when present. New
    /// checkpoints always store the raw state.
    pub fn from_snapshot(snapshot: Value) -> Result<Self, serde_json::Error> {
        let raw = match snapshot {
            Value::Object(ref map) if map.contains_key("workflow_state") => {
                map.get("workflow_state").cloned().unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(raw)
    }

    pub fn approved(&self) -> bool {
        self.hil_decision.as_ref().map(|d| d.approved).unwrap_or(false)
    }

    /// Response status string, when a response was produced.
    pub fn response_status(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|r| r.get("status"))
            .and_then(Value::as_str)
    }
}

impl FlowState for WorkflowState {
    fn is_halted(&self) -> bool {
        self.halt
    }

    fn record_node(&mut self, node_id: &str) {
        self.execution_history.push(node_id.to_string());
    }
}
