//! Banking graph definition
//!
//! ```text
//! validate_input -> confidence_check -(route_intent)-> balance_inquiry ------> END
//!                                               |----> account_statement ----> END
//!                                               |----> loan_inquiry ---------> END
//!                                               |----> fallback --------------> END
//!                                               |----> request_clarification -> END
//!                                               |----> money_transfer_hil ... (low-confidence hold)
//!                                               '----> money_transfer_prepare
//!                                                         |-(error)-> END
//!                                                         '-> money_transfer_hil
//!                                                               |-(transfer)-> money_transfer_execute -> END
//!                                                               '-(held intent)-> its branch -> END
//! ```
//!
//! The HIL gate pauses by raising the halt flag, which ends the turn at
//! the gate; the approve path resumes at the node the gate's outgoing
//! edge picks for the held intent (execution for transfers, the
//! classified branch for low-confidence holds).

use crate::bank::BankClient;
use crate::classifier::IntentClassifier;
use crate::hil::{HilGate, HilOutcome};
use crate::workflow::extract;
use crate::workflow::state::{HilDecision, Intent, TransferPayload, WorkflowState};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use waypoint_core::{node_fn, CheckpointPolicy, EngineError, Graph, NodeSpec, END};

pub const NODE_VALIDATE: &str = "validate_input";
pub const NODE_CONFIDENCE: &str = "confidence_check";
pub const NODE_BALANCE: &str = "balance_inquiry";
pub const NODE_PREPARE: &str = "money_transfer_prepare";
pub const NODE_HIL: &str = "money_transfer_hil";
pub const NODE_EXECUTE: &str = "money_transfer_execute";
pub const NODE_STATEMENT: &str = "account_statement";
pub const NODE_LOAN: &str = "loan_inquiry";
pub const NODE_FALLBACK: &str = "fallback";
pub const NODE_CLARIFY: &str = "request_clarification";

const DEFAULT_ACCOUNT: &str = "123";

/// Everything the banking nodes need at runtime.
pub struct BankingDeps {
    pub classifier: Arc<dyn IntentClassifier>,
    pub bank: BankClient,
    pub gate: Arc<HilGate>,
    /// Strict lower bound: confidence below this needs review
    pub confidence_threshold: f64,
    /// Transfers at or above this amount need review
    pub hil_threshold: f64,
}

async fn validate_input(
    classifier: Arc<dyn IntentClassifier>,
    mut state: WorkflowState,
) -> WorkflowState {
    let message = state.message.trim().to_string();

    if message.is_empty() {
        state.error = Some("empty message".to_string());
        state.intent = Some(Intent::Fallback);
        state.confidence = Some(0.0);
        return state;
    }

    // Slot-completion turn: the previous turn stashed a partial transfer.
    // The new message supplies the missing piece, not a fresh intent.
    if state.awaiting_completion
        && (state.context_amount.is_some() || state.context_recipient.is_some())
    {
        let parsed = extract::transfer_details(&message);
        state.amount = parsed.amount.or(state.context_amount);
        state.recipient = parsed.recipient.or_else(|| state.context_recipient.clone());
        state.intent = Some(Intent::MoneyTransfer);
        state.confidence = Some(0.85);
        tracing::info!(
            amount = ?state.amount,
            recipient = ?state.recipient,
            "restored conversational context"
        );
        return state;
    }

    let classification = classifier.classify(&message).await;
    tracing::info!(
        intent = %classification.intent,
        confidence = classification.confidence,
        "intent classified"
    );

    state.intent = Some(classification.intent);
    state.confidence = Some(classification.confidence);

    // Entities only mean anything for a transfer classification. A
    // classifier that returns slots alongside another intent must not
    // plant transfer details that a later approval would execute.
    if classification.intent == Intent::MoneyTransfer {
        state.amount = state.amount.or(classification.entities.amount);
        state.recipient = state.recipient.or(classification.entities.recipient);
        if let Some(account) = classification.entities.account {
            state.from_account = Some(account);
        }
    }

    state
}

fn confidence_check(threshold: f64, mut state: WorkflowState) -> WorkflowState {
    if state.error.is_some() {
        return state;
    }

    let confidence = state.confidence.unwrap_or(0.0);
    if confidence < threshold {
        state.needs_approval = true;
        state.approval_reason = Some("low confidence".to_string());
        tracing::info!(confidence, threshold, "low confidence, flagged for review");
    }

    if state.intent == Some(Intent::MoneyTransfer) {
        let complete = state.amount.is_some() && state.recipient.is_some();
        if complete {
            if state.awaiting_completion {
                // A slot was filled from carried-over context; route the
                // completed transfer through review regardless of amount.
                state.needs_approval = true;
                state.approval_reason = Some("conversational completion".to_string());
                state.awaiting_completion = false;
                state.context_amount = None;
                state.context_recipient = None;
            }
        } else {
            state.context_amount = state.amount.or(state.context_amount);
            state.context_recipient = state.recipient.clone().or(state.context_recipient.take());
            state.awaiting_completion = true;
        }
    }

    state
}

/// Route after classification. Pure: reads state, never writes it.
fn route_intent(state: &WorkflowState) -> String {
    if state.error.is_some() {
        return "fallback".to_string();
    }
    if state.awaiting_completion {
        return "clarify".to_string();
    }
    if state.needs_approval && state.intent != Some(Intent::MoneyTransfer) {
        // Low-confidence requests go to the gate whatever the intent.
        return "hold".to_string();
    }
    match state.intent {
        Some(Intent::BalanceInquiry) => "balance_inquiry",
        Some(Intent::MoneyTransfer) => "money_transfer",
        Some(Intent::AccountStatement) => "account_statement",
        Some(Intent::LoanInquiry) => "loan_inquiry",
        _ => "fallback",
    }
    .to_string()
}

async fn balance_inquiry(deps: Arc<BankingDeps>, mut state: WorkflowState) -> WorkflowState {
    let account = state.from_account.clone().unwrap_or_else(|| DEFAULT_ACCOUNT.into());

    match deps.bank.balance(&account).await {
        Ok(data) => {
            state.response = Some(json!({
                "intent": "balance_inquiry",
                "status": "success",
                "data": data,
            }));
        }
        Err(err) => record_downstream_failure(&mut state, "balance_inquiry", err.to_string()),
    }
    state
}

async fn account_statement(deps: Arc<BankingDeps>, mut state: WorkflowState) -> WorkflowState {
    let account = state.from_account.clone().unwrap_or_else(|| DEFAULT_ACCOUNT.into());

    match deps.bank.statement(&account).await {
        Ok(text) => {
            state.response = Some(json!({
                "intent": "account_statement",
                "status": "success",
                "data": {"statement": text},
            }));
        }
        Err(err) => record_downstream_failure(&mut state, "account_statement", err.to_string()),
    }
    state
}

async fn loan_inquiry(deps: Arc<BankingDeps>, mut state: WorkflowState) -> WorkflowState {
    let account = state.from_account.clone().unwrap_or_else(|| DEFAULT_ACCOUNT.into());

    match deps.bank.loan(&account).await {
        Ok(text) => {
            state.response = Some(json!({
                "intent": "loan_inquiry",
                "status": "success",
                "data": {"loan_info": text},
            }));
        }
        Err(err) => record_downstream_failure(&mut state, "loan_inquiry", err.to_string()),
    }
    state
}

fn request_clarification(mut state: WorkflowState) -> WorkflowState {
    let question = match (&state.context_amount, &state.context_recipient) {
        (None, Some(recipient)) => {
            format!("How much would you like to send to {recipient}?")
        }
        (Some(amount), None) => format!("Who would you like to send {amount} to?"),
        _ => "How much would you like to send, and to whom?".to_string(),
    };

    state.response = Some(json!({
        "status": "awaiting_info",
        "intent": "money_transfer",
        "message": question,
    }));
    state
}

fn money_transfer_prepare(hil_threshold: f64, mut state: WorkflowState) -> WorkflowState {
    // The classifier may have left slots unset; the raw message is the
    // source of truth for a direct transfer request.
    if state.amount.is_none() || state.recipient.is_none() {
        let parsed = extract::transfer_details(&state.message);
        state.amount = state.amount.or(parsed.amount);
        state.recipient = state.recipient.or(parsed.recipient);
    }

    let from_account = state
        .from_account
        .clone()
        .unwrap_or_else(|| DEFAULT_ACCOUNT.into());
    state.from_account = Some(from_account.clone());

    let (amount, recipient) = match (state.amount, state.recipient.clone()) {
        (Some(amount), Some(recipient)) => (amount, recipient),
        _ => {
            state.error = Some("could not extract transfer details".to_string());
            return state;
        }
    };

    state.request_data = Some(TransferPayload {
        from_account,
        to_account: recipient.clone(),
        amount,
    });

    // Below-threshold transfers skip review unless this turn was already
    // flagged (low confidence / conversational completion). Decided here,
    // in a node, because edge selectors must stay pure.
    if amount < hil_threshold && !state.needs_approval {
        state.hil_decision = Some(HilDecision::auto_approved());
    }

    tracing::info!(amount, recipient = %recipient, "transfer prepared");
    state
}

/// Route after prepare: extraction failure ends the turn.
fn route_after_prepare(state: &WorkflowState) -> String {
    if state.error.is_some() { "end" } else { "hil" }.to_string()
}

/// The node a session enters once the gate clears, in-turn or on resume.
///
/// Transfers continue to execution; a low-confidence hold re-enters the
/// branch of the intent that was actually classified, so approving a held
/// balance or statement request fulfills that request rather than
/// falling into the transfer path.
pub fn resume_node_after_gate(state: &WorkflowState) -> &'static str {
    match state.intent {
        Some(Intent::MoneyTransfer) => NODE_EXECUTE,
        Some(Intent::BalanceInquiry) => NODE_BALANCE,
        Some(Intent::AccountStatement) => NODE_STATEMENT,
        Some(Intent::LoanInquiry) => NODE_LOAN,
        _ => NODE_FALLBACK,
    }
}

/// Route after the gate. Pure: reads state, never writes it.
fn route_after_hil(state: &WorkflowState) -> String {
    resume_node_after_gate(state).to_string()
}

async fn money_transfer_hil(
    deps: Arc<BankingDeps>,
    state: WorkflowState,
) -> Result<WorkflowState, EngineError> {
    let outcome = deps
        .gate
        .execute(state)
        .await
        .map_err(|e| EngineError::node(NODE_HIL, e.to_string()))?;

    Ok(match outcome {
        HilOutcome::Continue(state) => state,
        HilOutcome::Pending { state, .. } => state,
    })
}

async fn money_transfer_execute(deps: Arc<BankingDeps>, mut state: WorkflowState) -> WorkflowState {
    if !state.approved() {
        state.error = Some("Transfer not approved".to_string());
        state.response = Some(json!({
            "intent": "money_transfer",
            "status": "error",
            "error": "Transfer not approved",
        }));
        return state;
    }

    // Pause-era checkpoints may predate `request_data`; rebuild it from
    // the individual slots on resume.
    let payload = match state.request_data.clone() {
        Some(payload) => payload,
        None => match (state.amount, state.recipient.clone(), state.from_account.clone()) {
            (Some(amount), Some(recipient), Some(from_account)) => {
                let payload = TransferPayload {
                    from_account,
                    to_account: recipient,
                    amount,
                };
                state.request_data = Some(payload.clone());
                payload
            }
            _ => {
                record_downstream_failure(
                    &mut state,
                    "money_transfer",
                    "transfer details missing".to_string(),
                );
                return state;
            }
        },
    };
    let approved_by = state
        .hil_decision
        .as_ref()
        .and_then(|d| d.approver_id.clone())
        .unwrap_or_else(|| "auto".to_string());

    match deps.bank.transfer(&payload).await {
        Ok(data) => {
            tracing::info!(amount = payload.amount, recipient = %payload.to_account, "transfer executed");
            state.response = Some(json!({
                "intent": "money_transfer",
                "status": "success",
                "data": data,
                "approved_by": approved_by,
            }));
        }
        Err(err) => record_downstream_failure(&mut state, "money_transfer", err.to_string()),
    }
    state
}

fn fallback(mut state: WorkflowState) -> WorkflowState {
    let mut response = json!({
        "intent": "fallback",
        "message": "I didn't understand that. Try: 'What's my balance?' or 'Transfer 1000 to Kiran'",
    });
    if let Some(error) = &state.error {
        response["error"] = json!(error);
    }
    state.response = Some(response);
    state
}

fn record_downstream_failure(state: &mut WorkflowState, intent: &str, message: String) {
    tracing::warn!(intent, %message, "downstream call failed");
    state.error = Some(message.clone());
    state.response = Some(json!({
        "intent": intent,
        "status": "error",
        "error": message,
    }));
}

/// Assemble the banking graph over the given dependencies.
pub fn build_banking_graph(deps: Arc<BankingDeps>) -> Graph<WorkflowState> {
    let mut graph = Graph::new(NODE_VALIDATE);

    let classifier = deps.classifier.clone();
    graph.add_node(NodeSpec::new(
        NODE_VALIDATE,
        node_fn(move |state| {
            let classifier = classifier.clone();
            async move { Ok(validate_input(classifier, state).await) }
        }),
        CheckpointPolicy::End,
    ));

    let threshold = deps.confidence_threshold;
    graph.add_node(NodeSpec::new(
        NODE_CONFIDENCE,
        node_fn(move |state| async move { Ok(confidence_check(threshold, state)) }),
        CheckpointPolicy::Skip,
    ));

    let d = deps.clone();
    graph.add_node(NodeSpec::new(
        NODE_BALANCE,
        node_fn(move |state| {
            let d = d.clone();
            async move { Ok(balance_inquiry(d, state).await) }
        }),
        CheckpointPolicy::Skip,
    ));

    let hil_threshold = deps.hil_threshold;
    graph.add_node(NodeSpec::new(
        NODE_PREPARE,
        node_fn(move |state| async move { Ok(money_transfer_prepare(hil_threshold, state)) }),
        CheckpointPolicy::End,
    ));

    let d = deps.clone();
    graph.add_node(NodeSpec::new(
        NODE_HIL,
        node_fn(move |state| {
            let d = d.clone();
            async move { money_transfer_hil(d, state).await }
        }),
        CheckpointPolicy::Skip,
    ));

    let d = deps.clone();
    graph.add_node(NodeSpec::new(
        NODE_EXECUTE,
        node_fn(move |state| {
            let d = d.clone();
            async move { Ok(money_transfer_execute(d, state).await) }
        }),
        CheckpointPolicy::Full,
    ));

    let d = deps.clone();
    graph.add_node(NodeSpec::new(
        NODE_STATEMENT,
        node_fn(move |state| {
            let d = d.clone();
            async move { Ok(account_statement(d, state).await) }
        }),
        CheckpointPolicy::Skip,
    ));

    let d = deps.clone();
    graph.add_node(NodeSpec::new(
        NODE_LOAN,
        node_fn(move |state| {
            let d = d.clone();
            async move { Ok(loan_inquiry(d, state).await) }
        }),
        CheckpointPolicy::Skip,
    ));

    graph.add_node(NodeSpec::new(
        NODE_FALLBACK,
        node_fn(move |state| async move { Ok(fallback(state)) }),
        CheckpointPolicy::Skip,
    ));

    graph.add_node(NodeSpec::new(
        NODE_CLARIFY,
        node_fn(move |state| async move { Ok(request_clarification(state)) }),
        CheckpointPolicy::Skip,
    ));

    graph.add_edge(NODE_VALIDATE, NODE_CONFIDENCE);

    graph.add_conditional_edge(
        NODE_CONFIDENCE,
        Arc::new(route_intent),
        HashMap::from([
            ("balance_inquiry".to_string(), NODE_BALANCE.to_string()),
            ("money_transfer".to_string(), NODE_PREPARE.to_string()),
            ("account_statement".to_string(), NODE_STATEMENT.to_string()),
            ("loan_inquiry".to_string(), NODE_LOAN.to_string()),
            ("fallback".to_string(), NODE_FALLBACK.to_string()),
            ("clarify".to_string(), NODE_CLARIFY.to_string()),
            ("hold".to_string(), NODE_HIL.to_string()),
        ]),
    );

    graph.add_conditional_edge(
        NODE_PREPARE,
        Arc::new(route_after_prepare),
        HashMap::from([
            ("hil".to_string(), NODE_HIL.to_string()),
            ("end".to_string(), END.to_string()),
        ]),
    );

    graph.add_conditional_edge(
        NODE_HIL,
        Arc::new(route_after_hil),
        HashMap::from([
            (NODE_EXECUTE.to_string(), NODE_EXECUTE.to_string()),
            (NODE_BALANCE.to_string(), NODE_BALANCE.to_string()),
            (NODE_STATEMENT.to_string(), NODE_STATEMENT.to_string()),
            (NODE_LOAN.to_string(), NODE_LOAN.to_string()),
            (NODE_FALLBACK.to_string(), NODE_FALLBACK.to_string()),
        ]),
    );

    graph.add_edge(NODE_BALANCE, END);
    graph.add_edge(NODE_EXECUTE, END);
    graph.add_edge(NODE_STATEMENT, END);
    graph.add_edge(NODE_LOAN, END);
    graph.add_edge(NODE_FALLBACK, END);
    graph.add_edge(NODE_CLARIFY, END);

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classification, Entities};

    /// A classifier that returns transfer slots alongside a non-transfer
    /// intent, the way a sloppy model can.
    struct ConfusedClassifier;

    #[async_trait::async_trait]
    impl IntentClassifier for ConfusedClassifier {
        async fn classify(&self, _message: &str) -> Classification {
            Classification {
                intent: Intent::Fallback,
                entities: Entities {
                    amount: Some(250.0),
                    recipient: Some("kiran".to_string()),
                    account: None,
                },
                confidence: 0.40,
            }
        }
    }

    #[tokio::test]
    async fn entities_from_non_transfer_classifications_are_discarded() {
        let state = WorkflowState::for_turn("wanna check something", "u1", "s-1");
        let state = validate_input(Arc::new(ConfusedClassifier), state).await;

        assert_eq!(state.intent, Some(Intent::Fallback));
        assert_eq!(state.amount, None);
        assert_eq!(state.recipient, None);
        assert_eq!(state.from_account.as_deref(), Some("123"));
    }

    #[test]
    fn gate_exit_dispatches_on_the_held_intent() {
        let mut state = WorkflowState::default();

        state.intent = Some(Intent::MoneyTransfer);
        assert_eq!(resume_node_after_gate(&state), NODE_EXECUTE);

        state.intent = Some(Intent::BalanceInquiry);
        assert_eq!(resume_node_after_gate(&state), NODE_BALANCE);

        state.intent = Some(Intent::AccountStatement);
        assert_eq!(resume_node_after_gate(&state), NODE_STATEMENT);

        state.intent = Some(Intent::LoanInquiry);
        assert_eq!(resume_node_after_gate(&state), NODE_LOAN);

        state.intent = Some(Intent::Fallback);
        assert_eq!(resume_node_after_gate(&state), NODE_FALLBACK);

        state.intent = None;
        assert_eq!(resume_node_after_gate(&state), NODE_FALLBACK);
    }

    #[test]
    fn route_intent_prefers_clarification_over_branches() {
        let mut state = WorkflowState::default();
        state.intent = Some(Intent::MoneyTransfer);
        state.awaiting_completion = true;
        assert_eq!(route_intent(&state), "clarify");
    }

    #[test]
    fn low_confidence_non_transfer_routes_to_hold() {
        let mut state = WorkflowState::default();
        state.intent = Some(Intent::Fallback);
        state.needs_approval = true;
        assert_eq!(route_intent(&state), "hold");
    }

    #[test]
    fn low_confidence_transfer_still_goes_through_prepare() {
        let mut state = WorkflowState::default();
        state.intent = Some(Intent::MoneyTransfer);
        state.needs_approval = true;
        assert_eq!(route_intent(&state), "money_transfer");
    }

    #[test]
    fn errors_route_to_fallback() {
        let mut state = WorkflowState::default();
        state.error = Some("empty message".to_string());
        assert_eq!(route_intent(&state), "fallback");
    }

    #[test]
    fn confidence_exactly_at_threshold_is_not_flagged() {
        let mut state = WorkflowState::default();
        state.intent = Some(Intent::BalanceInquiry);
        state.confidence = Some(0.80);
        let state = confidence_check(0.80, state);
        assert!(!state.needs_approval);
    }

    #[test]
    fn confidence_below_threshold_is_flagged() {
        let mut state = WorkflowState::default();
        state.intent = Some(Intent::BalanceInquiry);
        state.confidence = Some(0.45);
        let state = confidence_check(0.80, state);
        assert!(state.needs_approval);
        assert_eq!(state.approval_reason.as_deref(), Some("low confidence"));
    }

    #[test]
    fn incomplete_transfer_stashes_context() {
        let mut state = WorkflowState::default();
        state.intent = Some(Intent::MoneyTransfer);
        state.confidence = Some(0.85);
        state.recipient = Some("kiran".to_string());
        let state = confidence_check(0.80, state);

        assert!(state.awaiting_completion);
        assert_eq!(state.context_recipient.as_deref(), Some("kiran"));
        assert_eq!(state.context_amount, None);
    }

    #[test]
    fn completed_context_transfer_requires_review() {
        let mut state = WorkflowState::default();
        state.intent = Some(Intent::MoneyTransfer);
        state.confidence = Some(0.85);
        state.awaiting_completion = true;
        state.amount = Some(1000.0);
        state.recipient = Some("kiran".to_string());
        let state = confidence_check(0.80, state);

        assert!(state.needs_approval);
        assert_eq!(
            state.approval_reason.as_deref(),
            Some("conversational completion")
        );
        assert!(!state.awaiting_completion);
    }

    #[test]
    fn prepare_auto_approves_below_threshold() {
        let mut state = WorkflowState::for_turn("Transfer 1000 to kiran", "u1", "s-1");
        state.amount = Some(1000.0);
        state.recipient = Some("kiran".to_string());
        let state = money_transfer_prepare(5000.0, state);

        assert!(state.approved());
        assert!(state.hil_decision.unwrap().auto);
        assert_eq!(
            state.request_data.unwrap(),
            TransferPayload {
                from_account: "123".to_string(),
                to_account: "kiran".to_string(),
                amount: 1000.0,
            }
        );
    }

    #[test]
    fn prepare_never_auto_approves_flagged_turns() {
        let mut state = WorkflowState::for_turn("1000", "u1", "s-1");
        state.amount = Some(1000.0);
        state.recipient = Some("kiran".to_string());
        state.needs_approval = true;
        let state = money_transfer_prepare(5000.0, state);

        assert!(state.hil_decision.is_none());
    }

    #[test]
    fn prepare_at_threshold_leaves_decision_to_the_gate() {
        let mut state = WorkflowState::for_turn("Transfer 5000 to kiran", "u1", "s-1");
        state.amount = Some(5000.0);
        state.recipient = Some("kiran".to_string());
        let state = money_transfer_prepare(5000.0, state);

        assert!(state.hil_decision.is_none());
    }

    #[test]
    fn prepare_without_details_records_an_error() {
        let state = WorkflowState::for_turn("transfer please", "u1", "s-1");
        let state = money_transfer_prepare(5000.0, state);
        assert!(state.error.is_some());
        assert_eq!(route_after_prepare(&state), "end");
    }

    #[test]
    fn clarification_asks_for_the_missing_slot() {
        let mut state = WorkflowState::default();
        state.context_recipient = Some("kiran".to_string());
        let state = request_clarification(state);

        let message = state.response.unwrap()["message"].as_str().unwrap().to_string();
        assert_eq!(message, "How much would you like to send to kiran?");
    }
}
