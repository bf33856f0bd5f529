//! The [`CheckpointStore`] trait - storage abstraction for checkpoint backends
//!
//! The engine only ever appends (`save`) and reads (`load_latest`, `list`).
//! `clear` exists for external admin tooling; the engine never deletes.
//!
//! Implementations must guarantee:
//!
//! 1. **Append-only** - `save` never overwrites an existing record.
//! 2. **Total order per session** - `list` returns records in the order
//!    they were saved; `load_latest` returns the last of that order.
//! 3. **Self-describing state** - `state` and `metadata` round-trip through
//!    JSON without losing the integer/float distinction.
//!
//! # Implementing a custom backend
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use waypoint_checkpoint::{CheckpointStore, CheckpointMetadata, CheckpointRecord, Result};
//!
//! struct MyBackend { /* connection pool */ }
//!
//! #[async_trait]
//! impl CheckpointStore for MyBackend {
//!     async fn save(
//!         &self,
//!         session_id: &str,
//!         node_id: &str,
//!         state: serde_json::Value,
//!         metadata: CheckpointMetadata,
//!     ) -> Result<String> {
//!         let record = CheckpointRecord::new(session_id, node_id, state, metadata);
//!         // INSERT INTO checkpoints ...
//!         Ok(record.checkpoint_id)
//!     }
//!     // get / list / clear ...
//! }
//! ```

use crate::error::Result;
use crate::record::{CheckpointMetadata, CheckpointRecord};
use async_trait::async_trait;

/// Storage backend for workflow checkpoints.
///
/// Shared across sessions; implementations must be safe for concurrent
/// use (interior locking or a connection pool).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Append a new checkpoint and return its id.
    ///
    /// The id and `created_at` are assigned by the store. A failure here is
    /// fatal for the current turn - the engine surfaces it rather than
    /// continuing with an uncheckpointed state.
    async fn save(
        &self,
        session_id: &str,
        node_id: &str,
        state: serde_json::Value,
        metadata: CheckpointMetadata,
    ) -> Result<String>;

    /// Most recent checkpoint for a session, or `None` if it has none.
    async fn load_latest(&self, session_id: &str) -> Result<Option<CheckpointRecord>>;

    /// All checkpoints for a session in save order.
    async fn list(&self, session_id: &str) -> Result<Vec<CheckpointRecord>>;

    /// Remove every checkpoint for a session.
    ///
    /// Admin-only escape hatch. The engine itself never calls this.
    async fn clear(&self, session_id: &str) -> Result<()>;

    /// Number of checkpoints recorded for a session.
    async fn count(&self, session_id: &str) -> Result<usize> {
        Ok(self.list(session_id).await?.len())
    }
}
