//! Before/after comparison of two sessions, used after corrections are posted.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::{AuditSession, ControlResult, Level, Severity};
use super::snapshot::BalanceSnapshot;

const ACCOUNT_NOISE: Decimal = dec!(0.01);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    /// Anomaly before, OK after.
    Corrige,
    /// Still an anomaly, at a lower severity.
    Ameliore,
    /// Higher severity than before, including a new anomaly.
    Degrade,
    Inchange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleChange {
    pub reference: String,
    pub name: String,
    pub level: Level,
    pub kind: ChangeKind,
    pub severity_before: Severity,
    pub severity_after: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_before: Option<String>,
    pub message_after: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountChange {
    pub account_code: String,
    pub label: String,
    pub net_before: Decimal,
    pub net_after: Decimal,
    pub delta: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionSynthesis {
    pub blocking_before: usize,
    pub blocking_after: usize,
    pub major_before: usize,
    pub major_after: usize,
    pub score_before: u8,
    pub score_after: u8,
    pub corrected: usize,
    pub improved: usize,
    pub degraded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionReport {
    pub before_session: Uuid,
    pub after_session: Uuid,
    pub changes: Vec<RuleChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modified_accounts: Vec<AccountChange>,
    pub synthesis: CorrectionSynthesis,
}

impl CorrectionReport {
    pub fn changes_of(&self, kind: ChangeKind) -> impl Iterator<Item = &RuleChange> + '_ {
        self.changes.iter().filter(move |change| change.kind == kind)
    }
}

/// Classifies each rule of `after` against `before`; unchanged rules are omitted.
///
/// Rules absent from `after` (an interrupted re-audit) are skipped. Modified
/// accounts are only listed when both snapshots are given.
pub fn compare_sessions(
    before: &AuditSession,
    after: &AuditSession,
    before_snapshot: Option<&BalanceSnapshot>,
    after_snapshot: Option<&BalanceSnapshot>,
) -> CorrectionReport {
    let previous: BTreeMap<&str, &ControlResult> = before
        .results
        .iter()
        .map(|result| (result.reference.as_str(), result))
        .collect();

    let changes: Vec<RuleChange> = after
        .results
        .iter()
        .filter_map(|result| {
            let earlier = previous.get(result.reference.as_str()).copied();
            let change = classify(earlier, result);
            (change.kind != ChangeKind::Inchange).then_some(change)
        })
        .collect();

    let modified_accounts = match (before_snapshot, after_snapshot) {
        (Some(before), Some(after)) => modified_accounts(before, after),
        _ => Vec::new(),
    };

    let count = |kind| changes.iter().filter(|change| change.kind == kind).count();
    let synthesis = CorrectionSynthesis {
        blocking_before: before.summary.blocking_remaining,
        blocking_after: after.summary.blocking_remaining,
        major_before: before.summary.count(Severity::Majeur),
        major_after: after.summary.count(Severity::Majeur),
        score_before: before.summary.global_score,
        score_after: after.summary.global_score,
        corrected: count(ChangeKind::Corrige),
        improved: count(ChangeKind::Ameliore),
        degraded: count(ChangeKind::Degrade),
    };

    tracing::debug!(
        before = %before.id,
        after = %after.id,
        corrected = synthesis.corrected,
        degraded = synthesis.degraded,
        "sessions compared"
    );

    CorrectionReport {
        before_session: before.id,
        after_session: after.id,
        changes,
        modified_accounts,
        synthesis,
    }
}

fn classify(before: Option<&ControlResult>, after: &ControlResult) -> RuleChange {
    let severity_before = before.map_or(Severity::Ok, ControlResult::severity);
    let severity_after = after.severity();

    let kind = if severity_after > severity_before {
        ChangeKind::Degrade
    } else if severity_after == severity_before {
        ChangeKind::Inchange
    } else if severity_after == Severity::Ok {
        ChangeKind::Corrige
    } else {
        ChangeKind::Ameliore
    };

    RuleChange {
        reference: after.reference.clone(),
        name: after.name.clone(),
        level: after.level,
        kind,
        severity_before,
        severity_after,
        message_before: before.map(|result| result.message().to_string()),
        message_after: after.message().to_string(),
    }
}

fn modified_accounts(before: &BalanceSnapshot, after: &BalanceSnapshot) -> Vec<AccountChange> {
    let codes: BTreeSet<&str> = before
        .account_codes()
        .into_iter()
        .chain(after.account_codes())
        .collect();

    codes
        .into_iter()
        .filter_map(|code| {
            let old = before.entry(code);
            let new = after.entry(code);
            let net_before = old.map_or(Decimal::ZERO, |entry| entry.net());
            let net_after = new.map_or(Decimal::ZERO, |entry| entry.net());
            let delta = net_after - net_before;
            if delta.abs() <= ACCOUNT_NOISE {
                return None;
            }
            let label = new
                .or(old)
                .map(|entry| entry.label.clone())
                .unwrap_or_default();
            Some(AccountChange {
                account_code: code.to_string(),
                label,
                net_before,
                net_after,
                delta,
            })
        })
        .collect()
}
