//! LLM-backed intent classifier (Ollama-style HTTP API)
//!
//! Sends the message to a local model server and expects structured JSON
//! back. Every failure path - transport, non-2xx, unparseable output,
//! out-of-range values - falls back to the rule classifier, so the graph
//! never sees a classification error.

use super::{Classification, Entities, IntentClassifier, RuleClassifier};
use crate::workflow::Intent;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

fn json_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Models wrap JSON in prose or code fences; grab the outermost object.
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").unwrap())
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct LlmClassification {
    #[serde(default)]
    intent: String,
    #[serde(default)]
    entities: Entities,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Classifier that asks a local LLM, with rule-based fallback.
pub struct LlmClassifier {
    client: Client,
    base_url: String,
    model: String,
    fallback: RuleClassifier,
}

impl LlmClassifier {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            fallback: RuleClassifier::new(),
        }
    }

    fn prompt(message: &str) -> String {
        format!(
            r#"You are a banking assistant that analyzes customer requests.

User Request: "{message}"

Respond ONLY with valid JSON in this exact format:
{{
    "intent": "one of: balance_inquiry, money_transfer, account_statement, loan_inquiry, fallback",
    "entities": {{
        "amount": null or number,
        "recipient": null or string,
        "account": null or string
    }},
    "confidence": 0.95
}}

Rules:
1. confidence must be between 0.0 and 1.0
2. use 0.90+ for clear requests, below 0.80 for vague ones
3. extract amount as a number for transfers
4. handle typos gracefully (e.g. "tansfer" means "transfer")"#
        )
    }

    async fn try_classify(&self, message: &str) -> Result<Classification, String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": Self::prompt(message),
            "stream": false,
            "format": "json",
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("model server returned {}", response.status()));
        }

        let generated: GenerateResponse = response.json().await.map_err(|e| e.to_string())?;
        let text = json_block_re()
            .find(&generated.response)
            .map(|m| m.as_str())
            .unwrap_or(&generated.response);

        let parsed: LlmClassification =
            serde_json::from_str(text).map_err(|e| format!("bad model output: {e}"))?;

        let intent = match parsed.intent.as_str() {
            "balance_inquiry" => Intent::BalanceInquiry,
            "money_transfer" => Intent::MoneyTransfer,
            "account_statement" => Intent::AccountStatement,
            "loan_inquiry" => Intent::LoanInquiry,
            "fallback" => Intent::Fallback,
            other => return Err(format!("unknown intent `{other}`")),
        };

        let confidence = parsed.confidence.unwrap_or(0.5).clamp(0.0, 1.0);

        Ok(Classification {
            intent,
            entities: parsed.entities,
            confidence,
        })
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    async fn classify(&self, message: &str) -> Classification {
        match self.try_classify(message).await {
            Ok(classification) => classification,
            Err(error) => {
                tracing::warn!(%error, "LLM classification failed, using rule fallback");
                self.fallback.classify(message).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_block_is_extracted_from_prose() {
        let text = "Sure! Here you go:\n{\"intent\": \"balance_inquiry\", \"confidence\": 0.9}\nDone.";
        let found = json_block_re().find(text).unwrap().as_str();
        let parsed: LlmClassification = serde_json::from_str(found).unwrap();
        assert_eq!(parsed.intent, "balance_inquiry");
    }

    #[tokio::test]
    async fn unreachable_server_falls_back_to_rules() {
        let classifier = LlmClassifier::new(
            "http://127.0.0.1:1",
            "llama3",
            Duration::from_millis(200),
        );
        let c = classifier.classify("What is my balance?").await;
        assert_eq!(c.intent, Intent::BalanceInquiry);
    }
}
