//! Request and query DTOs

use serde::Deserialize;

/// POST /chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// POST /workflow/:session_id/approve
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalDecisionRequest {
    pub approver_id: String,
    pub approved: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// GET /sessions query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SessionListQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}
