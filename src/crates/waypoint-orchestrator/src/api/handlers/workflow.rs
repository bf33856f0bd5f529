//! Workflow introspection endpoints

use crate::api::error::ApiResult;
use crate::api::routes::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;

/// GET /workflow/:session_id/status
pub async fn workflow_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let view = state.service.session_status(&session_id).await?;
    Ok(Json(view))
}

/// GET /workflow/:session_id/checkpoints
pub async fn workflow_checkpoints(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let checkpoints = state.service.session_checkpoints(&session_id).await?;
    Ok(Json(json!({
        "session_id": session_id,
        "checkpoint_count": checkpoints.len(),
        "checkpoints": checkpoints,
    })))
}
