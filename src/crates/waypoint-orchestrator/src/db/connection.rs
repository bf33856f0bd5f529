//! Database connection management
//!
//! Wraps an sqlx SQLite pool and owns the schema for the two engine
//! tables: `workflow_sessions` and `pending_approvals`.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Type alias for the database connection pool
pub type DatabasePool = SqlitePool;

/// Database connection wrapper
#[derive(Clone)]
pub struct DatabaseConnection {
    pool: DatabasePool,
}

impl DatabaseConnection {
    /// Open (creating if missing) a SQLite database and ensure the schema.
    ///
    /// # Arguments
    /// * `database_url` - SQLite connection string, e.g. "sqlite:waypoint.db"
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let conn = Self { pool };
        conn.init_schema().await?;
        Ok(conn)
    }

    /// Open an in-memory database for tests.
    ///
    /// The pool is pinned to a single connection; SQLite gives every
    /// connection its own private `:memory:` database otherwise.
    pub async fn new_in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let conn = Self { pool };
        conn.init_schema().await?;
        Ok(conn)
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Create the session and approval tables if they do not exist.
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS workflow_sessions (
                session_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                workflow_type TEXT NOT NULL,
                status TEXT NOT NULL,
                current_node TEXT,
                execution_count INTEGER NOT NULL DEFAULT 0,
                conversation_history TEXT NOT NULL DEFAULT '[]',
                workflow_state TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON workflow_sessions(user_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pending_approvals (
                approval_id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                workflow_type TEXT NOT NULL,
                request_data TEXT NOT NULL,
                status TEXT NOT NULL,
                amount REAL,
                recipient TEXT,
                timeout_seconds INTEGER NOT NULL DEFAULT 3600,
                requested_at TEXT NOT NULL,
                approved_at TEXT,
                approver_id TEXT,
                rejection_reason TEXT,
                FOREIGN KEY (session_id) REFERENCES workflow_sessions(session_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_approvals_session ON pending_approvals(session_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_approvals_status ON pending_approvals(status)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Perform a health check by running a simple query
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_connection_is_healthy() {
        let conn = DatabaseConnection::new_in_memory().await.unwrap();
        assert!(conn.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn schema_init_is_idempotent() {
        let conn = DatabaseConnection::new_in_memory().await.unwrap();
        conn.init_schema().await.unwrap();
        conn.init_schema().await.unwrap();
    }
}
