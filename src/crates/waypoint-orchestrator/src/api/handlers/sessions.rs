//! Session list endpoint

use crate::api::error::ApiResult;
use crate::api::models::SessionListQuery;
use crate::api::routes::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::json;

/// GET /sessions?user_id=…
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionListQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let sessions = state.service.sessions(query.user_id.as_deref()).await?;
    Ok(Json(json!({
        "session_count": sessions.len(),
        "sessions": sessions,
    })))
}
