//! Rule-based intent classifier
//!
//! Regex matching over the four banking intents, tolerant of the typos
//! people actually type ("balanse", "tansfer", "statment"). Confidence is
//! graded: a transfer with both slots extracted scores highest, a
//! transfer missing a slot lower, anything unmatched drops to fallback.

use super::{Classification, Entities, IntentClassifier};
use crate::workflow::extract;
use crate::workflow::Intent;
use async_trait::async_trait;
use regex::RegexSet;

const CONFIDENCE_FULL_TRANSFER: f64 = 0.95;
const CONFIDENCE_PARTIAL_TRANSFER: f64 = 0.85;
const CONFIDENCE_CLEAR: f64 = 0.90;
const CONFIDENCE_FALLBACK: f64 = 0.30;

/// Regex rules with typo tolerance.
pub struct RuleClassifier {
    balance: RegexSet,
    transfer: RegexSet,
    statement: RegexSet,
    loan: RegexSet,
}

impl RuleClassifier {
    pub fn new() -> Self {
        Self {
            balance: RegexSet::new([
                r"\bbalance\b",
                r"\bbalanse\b",
                r"\bbalence\b",
                r"\bbalanc\b",
                r"\baccoun?t\s+balance\b",
                r"\bmy\s+balance\b",
                r"\bcheck\s+balance\b",
                r"\bshow\s+balance\b",
            ])
            .expect("balance patterns"),
            transfer: RegexSet::new([
                r"\btransfer\b",
                r"\btansfer\b",
                r"\btranfer\b",
                r"\btransffer\b",
                r"\btransfar\b",
                r"\bsend\b",
                r"\bsnd\b",
                r"\bpay\b",
                r"\bmove\b",
                r"\bgive\b",
                r"\b\d+\s+to\s+\w+\b",
            ])
            .expect("transfer patterns"),
            statement: RegexSet::new([
                r"\bstatement\b",
                r"\bstatment\b",
                r"\bstatemnt\b",
                r"\btransactions?\b",
                r"\btransacton\b",
                r"\bhistory\b",
                r"\bhistroy\b",
                r"\brecent\s+activity\b",
            ])
            .expect("statement patterns"),
            loan: RegexSet::new([
                r"\bloan\b",
                r"\blone\b",
                r"\blaon\b",
                r"\bcredit\b",
                r"\bkredit\b",
                r"\beligible\b",
                r"\beligable\b",
                r"\bborrow\b",
                r"\bborow\b",
            ])
            .expect("loan patterns"),
        }
    }
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntentClassifier for RuleClassifier {
    async fn classify(&self, message: &str) -> Classification {
        let lower = message.to_lowercase();

        if self.balance.is_match(&lower) {
            return Classification {
                intent: Intent::BalanceInquiry,
                entities: Entities::default(),
                confidence: CONFIDENCE_CLEAR,
            };
        }

        if self.transfer.is_match(&lower) {
            let details = extract::transfer_details(message);
            let complete = details.amount.is_some() && details.recipient.is_some();
            return Classification {
                intent: Intent::MoneyTransfer,
                entities: Entities {
                    amount: details.amount,
                    recipient: details.recipient,
                    account: None,
                },
                confidence: if complete {
                    CONFIDENCE_FULL_TRANSFER
                } else {
                    CONFIDENCE_PARTIAL_TRANSFER
                },
            };
        }

        if self.statement.is_match(&lower) {
            return Classification {
                intent: Intent::AccountStatement,
                entities: Entities::default(),
                confidence: CONFIDENCE_CLEAR,
            };
        }

        if self.loan.is_match(&lower) {
            return Classification {
                intent: Intent::LoanInquiry,
                entities: Entities::default(),
                confidence: CONFIDENCE_CLEAR,
            };
        }

        Classification {
            intent: Intent::Fallback,
            entities: Entities::default(),
            confidence: CONFIDENCE_FALLBACK,
        }
    }
}
