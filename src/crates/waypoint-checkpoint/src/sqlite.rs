//! Embedded SQLite checkpoint backend
//!
//! Single-file durable storage built on `sqlx`. The `id` rowid column
//! breaks `created_at` ties, so save order is the total order even when
//! two checkpoints land in the same microsecond.

use crate::error::{CheckpointError, Result};
use crate::record::{CheckpointMetadata, CheckpointRecord};
use crate::traits::CheckpointStore;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

/// Raw table row; JSON columns are decoded into [`CheckpointRecord`].
#[derive(Debug, FromRow)]
struct CheckpointRow {
    checkpoint_id: String,
    session_id: String,
    node_id: String,
    state: String,
    metadata: String,
    created_at: String,
}

impl CheckpointRow {
    fn into_record(self) -> Result<CheckpointRecord> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| CheckpointError::Invalid(format!("bad created_at: {e}")))?
            .with_timezone(&Utc);

        Ok(CheckpointRecord {
            checkpoint_id: self.checkpoint_id,
            session_id: self.session_id,
            node_id: self.node_id,
            state: serde_json::from_str(&self.state)?,
            metadata: serde_json::from_str(&self.metadata)?,
            created_at,
        })
    }
}

/// SQLite-backed checkpoint store (the embedded backend).
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Connect to a SQLite database and ensure the schema exists.
    ///
    /// Accepts any sqlx SQLite URL, e.g. `sqlite:checkpoints.db` or
    /// `sqlite::memory:`. The database file is created if missing.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| CheckpointError::Storage(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool (shared with the session database in tests).
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                checkpoint_id TEXT UNIQUE NOT NULL,
                session_id TEXT NOT NULL,
                node_id TEXT NOT NULL,
                state TEXT NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_checkpoints_session ON checkpoints(session_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_checkpoints_checkpoint ON checkpoints(checkpoint_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(
        &self,
        session_id: &str,
        node_id: &str,
        state: serde_json::Value,
        metadata: CheckpointMetadata,
    ) -> Result<String> {
        let checkpoint_id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            "INSERT INTO checkpoints (checkpoint_id, session_id, node_id, state, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&checkpoint_id)
        .bind(session_id)
        .bind(node_id)
        .bind(serde_json::to_string(&state)?)
        .bind(serde_json::to_string(&metadata)?)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(session_id, node_id, %checkpoint_id, "checkpoint saved");
        Ok(checkpoint_id)
    }

    async fn load_latest(&self, session_id: &str) -> Result<Option<CheckpointRecord>> {
        let row = sqlx::query_as::<_, CheckpointRow>(
            "SELECT checkpoint_id, session_id, node_id, state, metadata, created_at
             FROM checkpoints WHERE session_id = ?
             ORDER BY id DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CheckpointRow::into_record).transpose()
    }

    async fn list(&self, session_id: &str) -> Result<Vec<CheckpointRecord>> {
        let rows = sqlx::query_as::<_, CheckpointRow>(
            "SELECT checkpoint_id, session_id, node_id, state, metadata, created_at
             FROM checkpoints WHERE session_id = ?
             ORDER BY id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CheckpointRow::into_record).collect()
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM checkpoints WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self, session_id: &str) -> Result<usize> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM checkpoints WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CheckpointPhase;
    use serde_json::json;

    async fn store() -> SqliteCheckpointStore {
        SqliteCheckpointStore::connect("sqlite::memory:")
            .await
            .expect("in-memory store")
    }

    #[tokio::test]
    async fn save_then_load_latest_roundtrips_state() {
        let store = store().await;
        let state = json!({"message": "Transfer 1000 to kiran", "amount": 1000.0, "turn": 2});

        store
            .save(
                "s-1",
                "validate_input",
                state.clone(),
                CheckpointMetadata::new(CheckpointPhase::End),
            )
            .await
            .unwrap();

        let latest = store.load_latest("s-1").await.unwrap().unwrap();
        assert_eq!(latest.state, state);
        assert_eq!(latest.node_id, "validate_input");
        assert_eq!(latest.metadata.phase, CheckpointPhase::End);
    }

    #[tokio::test]
    async fn list_preserves_save_order() {
        let store = store().await;
        for i in 0..5 {
            store
                .save(
                    "s-1",
                    &format!("node_{i}"),
                    json!({"i": i}),
                    CheckpointMetadata::new(CheckpointPhase::End),
                )
                .await
                .unwrap();
        }

        let records = store.list("s-1").await.unwrap();
        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.state["i"], json!(i));
        }
        for pair in records.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[tokio::test]
    async fn load_latest_returns_none_for_unknown_session() {
        let store = store().await;
        assert!(store.load_latest("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_only_touches_the_given_session() {
        let store = store().await;
        for session in ["a", "b"] {
            store
                .save(
                    session,
                    "n",
                    json!({}),
                    CheckpointMetadata::new(CheckpointPhase::End),
                )
                .await
                .unwrap();
        }

        store.clear("a").await.unwrap();
        assert_eq!(store.count("a").await.unwrap(), 0);
        assert_eq!(store.count("b").await.unwrap(), 1);
    }
}
