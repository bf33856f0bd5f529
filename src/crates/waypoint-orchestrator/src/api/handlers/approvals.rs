//! Approval endpoints

use crate::api::error::ApiResult;
use crate::api::models::ApprovalDecisionRequest;
use crate::api::routes::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;

/// POST /workflow/:session_id/approve
///
/// Approve resumes the paused workflow and returns the final result;
/// reject terminates the session.
pub async fn approve_workflow(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<ApprovalDecisionRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let reply = state
        .service
        .decide_approval(
            &session_id,
            &req.approver_id,
            req.approved,
            req.reason.as_deref(),
        )
        .await?;

    Ok(Json(reply))
}

/// GET /approvals/pending
pub async fn pending_approvals(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let approvals = state.service.pending_approvals().await?;
    Ok(Json(json!({
        "pending_approvals": approvals,
    })))
}
