//! Shared-cache checkpoint backend (Redis)
//!
//! For deployments running several engine replicas against one store.
//! Each session keeps a `latest` key plus an append-only history list;
//! both carry a TTL, so this backend trades the embedded backend's
//! durability for shared access. Latest-by-session is an O(1) key read.

use crate::error::Result;
use crate::record::{CheckpointMetadata, CheckpointRecord};
use crate::traits::CheckpointStore;
use ::redis::aio::ConnectionManager;
use ::redis::AsyncCommands;
use async_trait::async_trait;

/// Default time-to-live for checkpoint keys: 24 hours.
const DEFAULT_TTL_SECONDS: u64 = 86_400;

/// Redis-backed checkpoint store (the shared-cache backend).
#[derive(Clone)]
pub struct RedisCheckpointStore {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisCheckpointStore {
    /// Connect to a Redis instance, e.g. `redis://localhost:6379`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = ::redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            ttl_seconds: DEFAULT_TTL_SECONDS,
        })
    }

    /// Override the key TTL.
    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    fn latest_key(session_id: &str) -> String {
        format!("checkpoint:{session_id}:latest")
    }

    fn history_key(session_id: &str) -> String {
        format!("checkpoint:{session_id}:history")
    }
}

#[async_trait]
impl CheckpointStore for RedisCheckpointStore {
    async fn save(
        &self,
        session_id: &str,
        node_id: &str,
        state: serde_json::Value,
        metadata: CheckpointMetadata,
    ) -> Result<String> {
        let record = CheckpointRecord::new(session_id, node_id, state, metadata);
        let payload = serde_json::to_string(&record)?;
        let mut conn = self.conn.clone();

        let _: () = conn
            .set_ex(Self::latest_key(session_id), &payload, self.ttl_seconds)
            .await?;
        let _: () = conn.rpush(Self::history_key(session_id), &payload).await?;
        let _: () = conn
            .expire(Self::history_key(session_id), self.ttl_seconds as i64)
            .await?;

        tracing::debug!(session_id, node_id, checkpoint_id = %record.checkpoint_id, "checkpoint saved");
        Ok(record.checkpoint_id)
    }

    async fn load_latest(&self, session_id: &str) -> Result<Option<CheckpointRecord>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(Self::latest_key(session_id)).await?;

        payload
            .map(|text| serde_json::from_str(&text).map_err(Into::into))
            .transpose()
    }

    async fn list(&self, session_id: &str) -> Result<Vec<CheckpointRecord>> {
        let mut conn = self.conn.clone();
        let entries: Vec<String> = conn.lrange(Self::history_key(session_id), 0, -1).await?;

        entries
            .iter()
            .map(|text| serde_json::from_str(text).map_err(Into::into))
            .collect()
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&[Self::latest_key(session_id), Self::history_key(session_id)])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_is_per_session() {
        assert_eq!(
            RedisCheckpointStore::latest_key("abc"),
            "checkpoint:abc:latest"
        );
        assert_eq!(
            RedisCheckpointStore::history_key("abc"),
            "checkpoint:abc:history"
        );
    }
}
