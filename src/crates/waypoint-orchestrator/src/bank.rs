//! Downstream banking collaborator client
//!
//! Thin reqwest wrapper over the external banking service's REST surface.
//! Failures here are business outcomes, not engine failures - callers
//! record them in workflow state and the turn still completes.

use crate::workflow::TransferPayload;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors from the downstream banking service
#[derive(Error, Debug)]
pub enum DownstreamError {
    /// Transport failure (connect, timeout)
    #[error("API call failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("Backend error: {0}")]
    Status(u16),
}

/// HTTP client for the banking backend.
#[derive(Clone)]
pub struct BankClient {
    client: Client,
    base_url: String,
}

impl BankClient {
    /// Build a client with a per-call timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// GET /api/balance?accountId=…
    pub async fn balance(&self, account_id: &str) -> Result<Value, DownstreamError> {
        let url = format!("{}/api/balance", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("accountId", account_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DownstreamError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }

    /// POST /api/transfer
    pub async fn transfer(&self, payload: &TransferPayload) -> Result<Value, DownstreamError> {
        let url = format!("{}/api/transfer", self.base_url);
        let response = self.client.post(&url).json(payload).send().await?;

        if !response.status().is_success() {
            return Err(DownstreamError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }

    /// GET /api/statement?accountId=… (textual payload)
    pub async fn statement(&self, account_id: &str) -> Result<String, DownstreamError> {
        self.get_text("statement", account_id).await
    }

    /// GET /api/loan?accountId=… (textual payload)
    pub async fn loan(&self, account_id: &str) -> Result<String, DownstreamError> {
        self.get_text("loan", account_id).await
    }

    async fn get_text(&self, endpoint: &str, account_id: &str) -> Result<String, DownstreamError> {
        let url = format!("{}/api/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("accountId", account_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DownstreamError::Status(response.status().as_u16()));
        }
        Ok(response.text().await?)
    }
}
