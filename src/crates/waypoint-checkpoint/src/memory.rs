//! In-memory checkpoint backend for tests
//!
//! Keeps every session's records in a `Vec`, so save order is the total
//! order by construction. Not for production: nothing survives a restart.

use crate::error::Result;
use crate::record::{CheckpointMetadata, CheckpointRecord};
use crate::traits::CheckpointStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Storage = Arc<RwLock<HashMap<String, Vec<CheckpointRecord>>>>;

/// In-process checkpoint store.
#[derive(Clone, Default)]
pub struct MemoryCheckpointStore {
    storage: Storage,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of checkpoints across all sessions.
    pub async fn total(&self) -> usize {
        self.storage.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(
        &self,
        session_id: &str,
        node_id: &str,
        state: serde_json::Value,
        metadata: CheckpointMetadata,
    ) -> Result<String> {
        let record = CheckpointRecord::new(session_id, node_id, state, metadata);
        let id = record.checkpoint_id.clone();

        self.storage
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(record);

        Ok(id)
    }

    async fn load_latest(&self, session_id: &str) -> Result<Option<CheckpointRecord>> {
        Ok(self
            .storage
            .read()
            .await
            .get(session_id)
            .and_then(|records| records.last().cloned()))
    }

    async fn list(&self, session_id: &str) -> Result<Vec<CheckpointRecord>> {
        Ok(self
            .storage
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        self.storage.write().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CheckpointPhase;
    use serde_json::json;

    #[tokio::test]
    async fn latest_follows_save_order() {
        let store = MemoryCheckpointStore::new();

        store
            .save(
                "s",
                "first",
                json!({"n": 1}),
                CheckpointMetadata::new(CheckpointPhase::End),
            )
            .await
            .unwrap();
        store
            .save(
                "s",
                "second",
                json!({"n": 2}),
                CheckpointMetadata::new(CheckpointPhase::Pause),
            )
            .await
            .unwrap();

        let latest = store.load_latest("s").await.unwrap().unwrap();
        assert_eq!(latest.node_id, "second");
        assert_eq!(latest.metadata.phase, CheckpointPhase::Pause);
        assert_eq!(store.count("s").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = MemoryCheckpointStore::new();
        store
            .save(
                "a",
                "n",
                json!({}),
                CheckpointMetadata::new(CheckpointPhase::End),
            )
            .await
            .unwrap();

        assert!(store.load_latest("b").await.unwrap().is_none());
        store.clear("a").await.unwrap();
        assert_eq!(store.total().await, 0);
    }
}
