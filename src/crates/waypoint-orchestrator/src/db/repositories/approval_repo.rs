//! Approval repository
//!
//! Decide-once semantics live here: `approve` and `reject` are guarded by
//! `WHERE status = 'pending'`, so a second decision never mutates the row
//! and surfaces as a conflict.

use crate::db::connection::DatabasePool;
use crate::db::error::{DatabaseError, DbResult};
use crate::db::models::{ApprovalRecord, ApprovalStatus};
use chrono::Utc;

/// Database operations for approval requests
pub struct ApprovalRepository;

impl ApprovalRepository {
    /// Insert a new pending approval request.
    pub async fn create(pool: &DatabasePool, record: &ApprovalRecord) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO pending_approvals
             (approval_id, session_id, workflow_type, request_data, status, amount, recipient,
              timeout_seconds, requested_at, approved_at, approver_id, rejection_reason)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.approval_id)
        .bind(&record.session_id)
        .bind(&record.workflow_type)
        .bind(&record.request_data)
        .bind(&record.status)
        .bind(record.amount)
        .bind(&record.recipient)
        .bind(record.timeout_seconds)
        .bind(&record.requested_at)
        .bind(&record.approved_at)
        .bind(&record.approver_id)
        .bind(&record.rejection_reason)
        .execute(pool)
        .await?;

        tracing::info!(
            approval_id = %record.approval_id,
            session_id = %record.session_id,
            amount = ?record.amount,
            "approval request created"
        );
        Ok(())
    }

    /// Fetch an approval by id.
    pub async fn get(pool: &DatabasePool, approval_id: &str) -> DbResult<Option<ApprovalRecord>> {
        Ok(sqlx::query_as::<_, ApprovalRecord>(
            "SELECT * FROM pending_approvals WHERE approval_id = ?",
        )
        .bind(approval_id)
        .fetch_optional(pool)
        .await?)
    }

    /// The single pending approval for a session, if any.
    ///
    /// The engine keeps at most one request pending per session; ordering
    /// by `requested_at` makes this robust against historical data that
    /// predates the invariant.
    pub async fn find_pending_for_session(
        pool: &DatabasePool,
        session_id: &str,
    ) -> DbResult<Option<ApprovalRecord>> {
        Ok(sqlx::query_as::<_, ApprovalRecord>(
            "SELECT * FROM pending_approvals
             WHERE session_id = ? AND status = 'pending'
             ORDER BY requested_at DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(pool)
        .await?)
    }

    /// Approve a pending request. Fails with `Conflict` when the request
    /// was already decided, `NotFound` when it does not exist.
    pub async fn approve(
        pool: &DatabasePool,
        approval_id: &str,
        approver_id: &str,
        reason: Option<&str>,
    ) -> DbResult<ApprovalRecord> {
        Self::decide(
            pool,
            approval_id,
            ApprovalStatus::Approved,
            approver_id,
            reason,
        )
        .await
    }

    /// Reject a pending request. Same guarantees as [`approve`](Self::approve).
    pub async fn reject(
        pool: &DatabasePool,
        approval_id: &str,
        approver_id: &str,
        reason: &str,
    ) -> DbResult<ApprovalRecord> {
        Self::decide(
            pool,
            approval_id,
            ApprovalStatus::Rejected,
            approver_id,
            Some(reason),
        )
        .await
    }

    async fn decide(
        pool: &DatabasePool,
        approval_id: &str,
        status: ApprovalStatus,
        approver_id: &str,
        reason: Option<&str>,
    ) -> DbResult<ApprovalRecord> {
        let decided_at = Utc::now().to_rfc3339();
        let rejection_reason = match status {
            ApprovalStatus::Rejected => reason,
            _ => None,
        };

        let result = sqlx::query(
            "UPDATE pending_approvals
             SET status = ?, approver_id = ?, approved_at = ?, rejection_reason = ?
             WHERE approval_id = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(approver_id)
        .bind(&decided_at)
        .bind(rejection_reason)
        .bind(approval_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return match Self::get(pool, approval_id).await? {
                Some(existing) => Err(DatabaseError::Conflict(format!(
                    "approval {approval_id} already {}",
                    existing.status
                ))),
                None => Err(DatabaseError::NotFound(format!("approval {approval_id}"))),
            };
        }

        tracing::info!(approval_id, status = %status, approver_id, "approval decided");
        Self::get(pool, approval_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("approval {approval_id}")))
    }

    /// All requests still awaiting a decision, newest first.
    pub async fn list_pending(pool: &DatabasePool) -> DbResult<Vec<ApprovalRecord>> {
        Ok(sqlx::query_as::<_, ApprovalRecord>(
            "SELECT * FROM pending_approvals WHERE status = 'pending' ORDER BY requested_at DESC",
        )
        .fetch_all(pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseConnection;
    use serde_json::json;

    async fn setup() -> (DatabaseConnection, ApprovalRecord) {
        let conn = DatabaseConnection::new_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO workflow_sessions
             (session_id, user_id, workflow_type, status, created_at, updated_at)
             VALUES ('s-1', 'u-1', 'banking', 'active', datetime('now'), datetime('now'))",
        )
        .execute(conn.pool())
        .await
        .unwrap();
        let record = ApprovalRecord::new(
            "s-1",
            "banking",
            &json!({"fromAccount": "123", "toAccount": "kiran", "amount": 6000.0}),
            Some(6000.0),
            Some("kiran".to_string()),
            3600,
        )
        .unwrap();
        ApprovalRepository::create(conn.pool(), &record).await.unwrap();
        (conn, record)
    }

    #[tokio::test]
    async fn approve_stamps_decision_fields() {
        let (conn, record) = setup().await;

        let decided =
            ApprovalRepository::approve(conn.pool(), &record.approval_id, "m1", Some("fine"))
                .await
                .unwrap();

        assert_eq!(decided.status().unwrap(), ApprovalStatus::Approved);
        assert_eq!(decided.approver_id.as_deref(), Some("m1"));
        assert!(decided.approved_at.is_some());
        assert!(decided.rejection_reason.is_none());
    }

    #[tokio::test]
    async fn double_decide_is_conflict_and_does_not_mutate() {
        let (conn, record) = setup().await;

        ApprovalRepository::approve(conn.pool(), &record.approval_id, "m1", None)
            .await
            .unwrap();
        let first = ApprovalRepository::get(conn.pool(), &record.approval_id)
            .await
            .unwrap()
            .unwrap();

        let err = ApprovalRepository::reject(conn.pool(), &record.approval_id, "m2", "risk")
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let after = ApprovalRepository::get(conn.pool(), &record.approval_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.approver_id, first.approver_id);
        assert_eq!(after.approved_at, first.approved_at);
        assert_eq!(after.status, first.status);
    }

    #[tokio::test]
    async fn reject_records_the_reason() {
        let (conn, record) = setup().await;

        let decided = ApprovalRepository::reject(conn.pool(), &record.approval_id, "m1", "risk")
            .await
            .unwrap();

        assert_eq!(decided.status().unwrap(), ApprovalStatus::Rejected);
        assert_eq!(decided.rejection_reason.as_deref(), Some("risk"));
    }

    #[tokio::test]
    async fn deciding_unknown_approval_is_not_found() {
        let conn = DatabaseConnection::new_in_memory().await.unwrap();
        let err = ApprovalRepository::approve(conn.pool(), "missing", "m1", None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn pending_lookup_skips_decided_requests() {
        let (conn, record) = setup().await;
        assert!(
            ApprovalRepository::find_pending_for_session(conn.pool(), "s-1")
                .await
                .unwrap()
                .is_some()
        );

        ApprovalRepository::approve(conn.pool(), &record.approval_id, "m1", None)
            .await
            .unwrap();

        assert!(
            ApprovalRepository::find_pending_for_session(conn.pool(), "s-1")
                .await
                .unwrap()
                .is_none()
        );
        assert!(ApprovalRepository::list_pending(conn.pool()).await.unwrap().is_empty());
    }
}
