//! API route definitions

use crate::service::WorkflowService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::handlers;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WorkflowService>,
}

/// Build the complete API router
pub fn create_router(service: Arc<WorkflowService>) -> Router {
    let app_state = AppState { service };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route(
            "/workflow/:session_id/approve",
            post(handlers::approve_workflow),
        )
        .route(
            "/workflow/:session_id/status",
            get(handlers::workflow_status),
        )
        .route(
            "/workflow/:session_id/checkpoints",
            get(handlers::workflow_checkpoints),
        )
        .route("/approvals/pending", get(handlers::pending_approvals))
        .route("/sessions", get(handlers::list_sessions))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
