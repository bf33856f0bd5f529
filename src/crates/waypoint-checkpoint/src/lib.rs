//! Durable checkpoint storage for waypoint workflows
//!
//! A checkpoint is a snapshot of workflow state taken at a node boundary.
//! The engine appends one record per boundary; nothing is ever overwritten,
//! so the per-session log doubles as an audit trail and as the recovery
//! point for suspended (human-in-the-loop) sessions.
//!
//! The crate provides:
//!
//! - [`CheckpointStore`] - the storage abstraction the engine writes through
//! - [`SqliteCheckpointStore`] - embedded backend (single-process, durable)
//! - [`RedisCheckpointStore`] - shared-cache backend for multi-replica
//!   deployments (TTL-bounded, weaker durability)
//! - [`MemoryCheckpointStore`] - in-process backend for tests
//!
//! # Example
//!
//! ```rust,ignore
//! use waypoint_checkpoint::{CheckpointStore, CheckpointMetadata, CheckpointPhase, SqliteCheckpointStore};
//!
//! let store = SqliteCheckpointStore::connect("sqlite:checkpoints.db").await?;
//! let id = store
//!     .save("session-1", "validate_input", state_json, CheckpointMetadata::new(CheckpointPhase::End))
//!     .await?;
//! let latest = store.load_latest("session-1").await?;
//! ```

pub mod error;
pub mod memory;
pub mod record;
pub mod redis;
pub mod sqlite;
pub mod traits;

pub use self::error::{CheckpointError, Result};
pub use self::memory::MemoryCheckpointStore;
pub use self::record::{CheckpointMetadata, CheckpointPhase, CheckpointRecord};
pub use self::redis::RedisCheckpointStore;
pub use self::sqlite::SqliteCheckpointStore;
pub use self::traits::CheckpointStore;
