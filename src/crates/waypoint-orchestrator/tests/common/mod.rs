//! Shared test harness: a mock banking backend plus a fully wired service
//! over in-memory stores.

use axum::extract::Query;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use waypoint_checkpoint::MemoryCheckpointStore;
use waypoint_orchestrator::classifier::{IntentClassifier, RuleClassifier};
use waypoint_orchestrator::config::ServerConfig;
use waypoint_orchestrator::db::DatabaseConnection;
use waypoint_orchestrator::WorkflowService;

/// A fake downstream banking service that counts calls.
pub struct MockBank {
    pub base_url: String,
    pub transfer_calls: Arc<AtomicUsize>,
    pub balance_calls: Arc<AtomicUsize>,
}

impl MockBank {
    pub fn transfers(&self) -> usize {
        self.transfer_calls.load(Ordering::SeqCst)
    }

    pub fn balance_requests(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }
}

pub async fn spawn_mock_bank() -> MockBank {
    let transfer_calls = Arc::new(AtomicUsize::new(0));
    let balance_calls = Arc::new(AtomicUsize::new(0));

    let transfers = transfer_calls.clone();
    let balances = balance_calls.clone();

    let app = Router::new()
        .route(
            "/api/balance",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let balances = balances.clone();
                async move {
                    balances.fetch_add(1, Ordering::SeqCst);
                    let account = params.get("accountId").cloned().unwrap_or_default();
                    Json(json!({"accountId": account, "balance": 50000.0}))
                }
            }),
        )
        .route(
            "/api/transfer",
            post(move |Json(body): Json<Value>| {
                let transfers = transfers.clone();
                async move {
                    transfers.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "success": true,
                        "message": format!(
                            "Transferred {} from {} to {}",
                            body["amount"], body["fromAccount"], body["toAccount"]
                        ),
                    }))
                }
            }),
        )
        .route(
            "/api/statement",
            get(|| async { "1. Grocery -120.00\n2. Salary +4000.00" }),
        )
        .route(
            "/api/loan",
            get(|| async { "Eligible for personal loan up to 100000" }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock bank");
    let addr = listener.local_addr().expect("mock bank addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock bank server");
    });

    MockBank {
        base_url: format!("http://{addr}"),
        transfer_calls,
        balance_calls,
    }
}

/// A wired service over in-memory stores and the mock bank.
pub struct TestApp {
    pub service: Arc<WorkflowService>,
    pub checkpoints: Arc<MemoryCheckpointStore>,
    pub bank: MockBank,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_classifier(Arc::new(RuleClassifier::new())).await
}

pub async fn spawn_app_with_classifier(classifier: Arc<dyn IntentClassifier>) -> TestApp {
    let bank = spawn_mock_bank().await;

    let mut config = ServerConfig::default();
    config.downstream.base_url = bank.base_url.clone();
    config.downstream.timeout_ms = 2_000;

    let db = DatabaseConnection::new_in_memory().await.expect("test db");
    let checkpoints = Arc::new(MemoryCheckpointStore::new());

    let service = WorkflowService::new(config, db, checkpoints.clone(), classifier)
        .expect("wire service");

    TestApp {
        service: Arc::new(service),
        checkpoints,
        bank,
    }
}
