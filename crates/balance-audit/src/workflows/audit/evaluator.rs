//! Fault-isolated evaluation of a single rule.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use super::catalog::ControlRule;
use super::domain::{ControlResult, RuleOutcome, RuleStatus, Severity};
use super::snapshot::BalanceSnapshot;

/// Runs `rule` and stamps its identity on the outcome.
///
/// A panicking rule becomes a BLOQUANT anomaly naming the rule, so one broken
/// control never aborts the audit.
pub fn evaluate_rule(
    rule: &ControlRule,
    current: &BalanceSnapshot,
    prior: Option<&BalanceSnapshot>,
) -> ControlResult {
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| rule.apply(current, prior))) {
        Ok(outcome) => sanitize(rule.reference(), outcome),
        Err(payload) => {
            let cause = panic_message(payload.as_ref());
            tracing::warn!(
                rule = rule.reference(),
                level = rule.level().value(),
                cause = %cause,
                "rule evaluation failed"
            );
            RuleOutcome::anomaly(
                Severity::Bloquant,
                format!("Erreur d'execution du controle {}: {cause}", rule.reference()),
            )
            .with_suggestion("Signaler l'anomalie technique; le controle n'a pas pu etre evalue")
        }
    };

    tracing::debug!(
        rule = rule.reference(),
        level = rule.level().value(),
        status = outcome.status.code(),
        severity = outcome.severity.code(),
        "rule evaluated"
    );

    ControlResult {
        reference: rule.reference().to_string(),
        name: rule.name().to_string(),
        level: rule.level(),
        outcome,
    }
}

/// Restores `OK <=> severity OK` and drops corrective entries that do not balance.
fn sanitize(reference: &str, mut outcome: RuleOutcome) -> RuleOutcome {
    match outcome.status {
        RuleStatus::Ok => outcome.severity = Severity::Ok,
        RuleStatus::Anomalie if outcome.severity == Severity::Ok => {
            outcome.severity = Severity::Info;
        }
        RuleStatus::Anomalie => {}
    }
    let proposed = outcome.corrective_entries.len();
    outcome.corrective_entries.retain(|entry| entry.is_balanced());
    let dropped = proposed - outcome.corrective_entries.len();
    if dropped > 0 {
        tracing::warn!(rule = reference, dropped, "unbalanced corrective entries discarded");
    }
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "panique sans message".to_string()
    }
}
