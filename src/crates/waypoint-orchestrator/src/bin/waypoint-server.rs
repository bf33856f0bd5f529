//! Waypoint orchestrator server binary
//!
//! Standalone REST server: loads configuration, opens the session store
//! and the configured checkpoint backend, wires the banking graph, and
//! serves the facade until SIGTERM/Ctrl-C.

use std::sync::Arc;
use waypoint_checkpoint::{CheckpointStore, RedisCheckpointStore, SqliteCheckpointStore};
use waypoint_orchestrator::api::create_router;
use waypoint_orchestrator::classifier::{IntentClassifier, LlmClassifier, RuleClassifier};
use waypoint_orchestrator::config::{ClassifierMode, ServerConfig, StorageBackend};
use waypoint_orchestrator::db::DatabaseConnection;
use waypoint_orchestrator::WorkflowService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let config = ServerConfig::load()?;
    tracing::info!(
        database = %config.database.url,
        downstream = %config.downstream.base_url,
        hil_threshold = config.hil.threshold,
        "configuration loaded"
    );

    let db = DatabaseConnection::new(&config.database.url).await?;
    db.health_check().await?;

    let checkpoints: Arc<dyn CheckpointStore> = match config.storage.backend {
        StorageBackend::Embedded => {
            tracing::info!(path = %config.storage.path_or_url, "using embedded checkpoint store");
            Arc::new(SqliteCheckpointStore::connect(&config.storage.path_or_url).await?)
        }
        StorageBackend::SharedCache => {
            tracing::info!(url = %config.storage.path_or_url, "using shared-cache checkpoint store");
            Arc::new(RedisCheckpointStore::connect(&config.storage.path_or_url).await?)
        }
    };

    let classifier: Arc<dyn IntentClassifier> = match config.classifier.mode {
        ClassifierMode::Rules => Arc::new(RuleClassifier::new()),
        ClassifierMode::Llm => {
            tracing::info!(
                url = %config.classifier.llm_url,
                model = %config.classifier.llm_model,
                "using LLM classifier with rule fallback"
            );
            Arc::new(LlmClassifier::new(
                config.classifier.llm_url.clone(),
                config.classifier.llm_model.clone(),
                std::time::Duration::from_millis(config.downstream.timeout_ms),
            ))
        }
    };

    let addr = config.bind_addr();
    let service = Arc::new(WorkflowService::new(config, db, checkpoints, classifier)?);
    let app = create_router(service);

    tracing::info!(%addr, "starting waypoint server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("waypoint server shut down gracefully");
    Ok(())
}

/// Signal for graceful shutdown (Ctrl-C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL-C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received CTRL-C, shutting down");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
}
