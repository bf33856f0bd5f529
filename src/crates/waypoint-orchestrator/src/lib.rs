//! Waypoint orchestrator: the banking workflow over the waypoint engine
//!
//! Ties the generic pieces together into a running service:
//!
//! - [`db`] - session and approval persistence (SQLite via sqlx)
//! - [`hil`] - the human-in-the-loop gate (pause / approve / reject)
//! - [`classifier`] - intent classification (rule-based, optional LLM)
//! - [`bank`] - the downstream banking collaborator client
//! - [`workflow`] - the banking graph: state schema, nodes, edges
//! - [`service`] - turn orchestration (chat, approval, introspection)
//! - [`api`] - the axum REST facade
//! - [`config`] - server configuration

pub mod api;
pub mod bank;
pub mod classifier;
pub mod config;
pub mod db;
pub mod hil;
pub mod service;
pub mod workflow;

pub use config::ServerConfig;
pub use service::WorkflowService;
