//! POST /chat

use crate::api::error::ApiResult;
use crate::api::models::ChatRequest;
use crate::api::routes::AppState;
use axum::{extract::State, Json};

/// Run one conversational turn. Responds with either the terminal result,
/// a pending-approval envelope, or a clarification question.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let reply = state
        .service
        .chat(
            &req.message,
            req.session_id.as_deref(),
            req.user_id.as_deref(),
        )
        .await?;

    Ok(Json(reply))
}
