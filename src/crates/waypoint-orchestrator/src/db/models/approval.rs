//! Approval request model

use crate::db::error::{DatabaseError, DbResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::fmt;

/// Status of an approval request. Once out of `Pending` the record is
/// terminal - there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Timeout,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Timeout => "timeout",
        }
    }

    pub fn parse(value: &str) -> DbResult<Self> {
        match value {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            "timeout" => Ok(ApprovalStatus::Timeout),
            other => Err(DatabaseError::InvalidValue(format!(
                "unknown approval status `{other}`"
            ))),
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending (or decided) approval request row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApprovalRecord {
    /// Unique approval identifier (UUID string)
    pub approval_id: String,

    /// Session the paused workflow belongs to
    pub session_id: String,

    /// Workflow type, for the admin surface
    pub workflow_type: String,

    /// Serialized downstream payload awaiting approval (JSON)
    pub request_data: String,

    /// pending | approved | rejected | timeout
    pub status: String,

    /// Transfer amount, when the request carries one
    pub amount: Option<f64>,

    /// Transfer recipient, when the request carries one
    pub recipient: Option<String>,

    /// Advisory timeout for external sweepers; never enforced here
    pub timeout_seconds: i64,

    /// When the request was created (ISO-8601)
    pub requested_at: String,

    /// When the request was decided (ISO-8601)
    pub approved_at: Option<String>,

    /// Who decided
    pub approver_id: Option<String>,

    /// Reason given on rejection
    pub rejection_reason: Option<String>,
}

impl ApprovalRecord {
    pub fn new(
        session_id: impl Into<String>,
        workflow_type: impl Into<String>,
        request_data: &Value,
        amount: Option<f64>,
        recipient: Option<String>,
        timeout_seconds: i64,
    ) -> DbResult<Self> {
        Ok(Self {
            approval_id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            workflow_type: workflow_type.into(),
            request_data: serde_json::to_string(request_data)?,
            status: ApprovalStatus::Pending.as_str().to_string(),
            amount,
            recipient,
            timeout_seconds,
            requested_at: Utc::now().to_rfc3339(),
            approved_at: None,
            approver_id: None,
            rejection_reason: None,
        })
    }

    pub fn status(&self) -> DbResult<ApprovalStatus> {
        ApprovalStatus::parse(&self.status)
    }

    pub fn request_value(&self) -> DbResult<Value> {
        Ok(serde_json::from_str(&self.request_data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_requests_are_pending() {
        let record = ApprovalRecord::new(
            "s-1",
            "banking",
            &json!({"fromAccount": "123", "toAccount": "kiran", "amount": 6000.0}),
            Some(6000.0),
            Some("kiran".to_string()),
            3600,
        )
        .unwrap();

        assert_eq!(record.status().unwrap(), ApprovalStatus::Pending);
        assert_eq!(record.request_value().unwrap()["toAccount"], "kiran");
        assert!(record.approved_at.is_none());
    }
}
