//! HTTP-level tests: the axum facade end to end over a real socket

mod common;

use common::spawn_app;
use serde_json::{json, Value};
use waypoint_orchestrator::api::create_router;

async fn spawn_http() -> (String, common::TestApp) {
    let app = spawn_app().await;
    let router = create_router(app.service.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}"), app)
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let (base, _app) = spawn_http().await;

    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], json!("healthy"));
}

#[tokio::test]
async fn chat_and_approval_over_http() {
    let (base, app) = spawn_http().await;
    let client = reqwest::Client::new();

    // High-value transfer pauses.
    let response = client
        .post(format!("{base}/chat"))
        .json(&json!({"message": "Transfer 6000 to kiran", "user_id": "u1"}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], json!("PENDING_APPROVAL"));
    assert_eq!(body["reply"]["amount"], json!(6000.0));
    let session_id = body["session_id"].as_str().unwrap().to_string();

    // The pending approval is visible to the admin surface.
    let pending: Value = client
        .get(format!("{base}/approvals/pending"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        pending["pending_approvals"][0]["session_id"].as_str(),
        Some(session_id.as_str())
    );

    // Status endpoint shows the paused session.
    let status: Value = client
        .get(format!("{base}/workflow/{session_id}/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], json!("pending_approval"));
    assert_eq!(status["checkpoints"], json!(3));

    // Approve and resume.
    let approved: Value = client
        .post(format!("{base}/workflow/{session_id}/approve"))
        .json(&json!({"approver_id": "m1", "approved": true}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(approved["status"], json!("approved"));
    assert_eq!(approved["result"]["data"]["success"], json!(true));
    assert_eq!(app.bank.transfers(), 1);

    // Checkpoint listing is ordered and complete.
    let checkpoints: Value = client
        .get(format!("{base}/workflow/{session_id}/checkpoints"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(checkpoints["checkpoint_count"], json!(7));
}

#[tokio::test]
async fn invalid_requests_map_to_client_errors() {
    let (base, _app) = spawn_http().await;
    let client = reqwest::Client::new();

    // Blank message -> validation error.
    let response = client
        .post(format!("{base}/chat"))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);

    // Unknown session -> 404.
    let response = client
        .get(format!("{base}/workflow/no-such-session/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // Approving a session that is not pending -> 404 (unknown session).
    let response = client
        .post(format!("{base}/workflow/no-such-session/approve"))
        .json(&json!({"approver_id": "m1", "approved": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn balance_flow_over_http() {
    let (base, app) = spawn_http().await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{base}/chat"))
        .json(&json!({"message": "What is my balance?", "user_id": "u1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["reply"]["data"]["balance"], json!(50000.0));
    assert_eq!(app.bank.balance_requests(), 1);

    let session_id = body["session_id"].as_str().unwrap();
    let sessions: Value = client
        .get(format!("{base}/sessions?user_id=u1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sessions["session_count"], json!(1));
    assert_eq!(sessions["sessions"][0]["session_id"], json!(session_id));
}
