//! Session repository

use crate::db::connection::DatabasePool;
use crate::db::error::{DatabaseError, DbResult};
use crate::db::models::SessionRecord;

/// Database operations for workflow sessions
pub struct SessionRepository;

impl SessionRepository {
    /// Insert a new session row.
    pub async fn create(pool: &DatabasePool, session: &SessionRecord) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO workflow_sessions
             (session_id, user_id, workflow_type, status, current_node, execution_count,
              conversation_history, workflow_state, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.session_id)
        .bind(&session.user_id)
        .bind(&session.workflow_type)
        .bind(&session.status)
        .bind(&session.current_node)
        .bind(session.execution_count)
        .bind(&session.conversation_history)
        .bind(&session.workflow_state)
        .bind(&session.created_at)
        .bind(&session.updated_at)
        .execute(pool)
        .await?;

        tracing::info!(session_id = %session.session_id, user_id = %session.user_id, "session created");
        Ok(())
    }

    /// Fetch a session by id.
    pub async fn get(pool: &DatabasePool, session_id: &str) -> DbResult<Option<SessionRecord>> {
        Ok(sqlx::query_as::<_, SessionRecord>(
            "SELECT * FROM workflow_sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(pool)
        .await?)
    }

    /// Fetch a session by id, failing when it does not exist.
    pub async fn get_required(pool: &DatabasePool, session_id: &str) -> DbResult<SessionRecord> {
        Self::get(pool, session_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("session {session_id}")))
    }

    /// Persist the mutable parts of a session (status, counters, history,
    /// state, current node).
    pub async fn save(pool: &DatabasePool, session: &SessionRecord) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE workflow_sessions
             SET status = ?, current_node = ?, execution_count = ?,
                 conversation_history = ?, workflow_state = ?, updated_at = ?
             WHERE session_id = ?",
        )
        .bind(&session.status)
        .bind(&session.current_node)
        .bind(session.execution_count)
        .bind(&session.conversation_history)
        .bind(&session.workflow_state)
        .bind(&session.updated_at)
        .bind(&session.session_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "session {}",
                session.session_id
            )));
        }
        Ok(())
    }

    /// List sessions, optionally filtered by user, newest first.
    pub async fn list(
        pool: &DatabasePool,
        user_id: Option<&str>,
    ) -> DbResult<Vec<SessionRecord>> {
        let records = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, SessionRecord>(
                    "SELECT * FROM workflow_sessions WHERE user_id = ? ORDER BY updated_at DESC",
                )
                .bind(user_id)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SessionRecord>(
                    "SELECT * FROM workflow_sessions ORDER BY updated_at DESC",
                )
                .fetch_all(pool)
                .await?
            }
        };
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SessionStatus;
    use crate::db::DatabaseConnection;

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let conn = DatabaseConnection::new_in_memory().await.unwrap();
        let session = SessionRecord::new("u1", "banking");
        SessionRepository::create(conn.pool(), &session).await.unwrap();

        let loaded = SessionRepository::get(conn.pool(), &session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.user_id, "u1");
        assert_eq!(loaded.status().unwrap(), SessionStatus::Active);
    }

    #[tokio::test]
    async fn save_persists_mutations() {
        let conn = DatabaseConnection::new_in_memory().await.unwrap();
        let mut session = SessionRecord::new("u1", "banking");
        SessionRepository::create(conn.pool(), &session).await.unwrap();

        session.increment_execution();
        session.current_node = Some("validate_input".to_string());
        session.set_status(SessionStatus::Completed).unwrap();
        SessionRepository::save(conn.pool(), &session).await.unwrap();

        let loaded = SessionRepository::get_required(conn.pool(), &session.session_id)
            .await
            .unwrap();
        assert_eq!(loaded.execution_count, 1);
        assert_eq!(loaded.current_node.as_deref(), Some("validate_input"));
        assert_eq!(loaded.status().unwrap(), SessionStatus::Completed);
    }

    #[tokio::test]
    async fn save_unknown_session_is_not_found() {
        let conn = DatabaseConnection::new_in_memory().await.unwrap();
        let session = SessionRecord::new("u1", "banking");
        let err = SessionRepository::save(conn.pool(), &session).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_filters_by_user() {
        let conn = DatabaseConnection::new_in_memory().await.unwrap();
        for user in ["u1", "u1", "u2"] {
            SessionRepository::create(conn.pool(), &SessionRecord::new(user, "banking"))
                .await
                .unwrap();
        }

        assert_eq!(
            SessionRepository::list(conn.pool(), Some("u1")).await.unwrap().len(),
            2
        );
        assert_eq!(SessionRepository::list(conn.pool(), None).await.unwrap().len(), 3);
    }
}
