//! Intent classification
//!
//! The graph only sees the [`IntentClassifier`] trait; the default
//! implementation is rule-based ([`RuleClassifier`]), with an optional
//! LLM-backed one ([`LlmClassifier`]) that degrades to the rules on any
//! transport or parse failure - classification is never fatal.

pub mod llm;
pub mod rules;

use crate::workflow::Intent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use llm::LlmClassifier;
pub use rules::RuleClassifier;

/// Entities extracted alongside the intent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

/// Result of classifying one message
#[derive(Debug, Clone)]
pub struct Classification {
    pub intent: Intent,
    pub entities: Entities,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

/// Pluggable intent classifier.
///
/// Implementations must not fail: a backend that can error is expected to
/// fall back to rule-based classification internally.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, message: &str) -> Classification;
}
