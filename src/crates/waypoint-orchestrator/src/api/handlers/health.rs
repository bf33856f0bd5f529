//! Health check endpoint

use axum::Json;
use serde_json::json;

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "waypoint-orchestrator",
        "features": [
            "checkpointing",
            "human-in-the-loop",
            "session-management",
            "workflow-resume",
        ],
    }))
}
