use rust_decimal_macros::dec;

use super::common::*;
use crate::workflows::audit::comparison::{compare_sessions, ChangeKind};
use crate::workflows::audit::domain::{Level, RuleOutcome, SessionStatus, Severity};
use crate::workflows::audit::snapshot::BalanceSnapshot;

fn anomaly(severity: Severity) -> RuleOutcome {
    RuleOutcome::anomaly(severity, format!("anomalie {severity}"))
}

#[test]
fn changes_are_classified_by_severity_movement() {
    let before = session_with(
        vec![
            result("F-001", Level::FUNDAMENTAL, anomaly(Severity::Bloquant)),
            result("SS-005", Level::DIRECTION, anomaly(Severity::Majeur)),
            result("IC-010", Level::CROSS_ACCOUNT, RuleOutcome::ok("RAS")),
            result("EF-001", Level::STATEMENTS, anomaly(Severity::Mineur)),
            result("FI-001", Level::FISCAL, anomaly(Severity::Info)),
        ],
        SessionStatus::Completed,
    );
    let after = session_with(
        vec![
            result("F-001", Level::FUNDAMENTAL, RuleOutcome::ok("equilibre")),
            result("SS-005", Level::DIRECTION, anomaly(Severity::Mineur)),
            result("IC-010", Level::CROSS_ACCOUNT, anomaly(Severity::Majeur)),
            result("EF-001", Level::STATEMENTS, anomaly(Severity::Mineur)),
            result("AR-002", Level::MULTI_YEAR, anomaly(Severity::Info)),
        ],
        SessionStatus::Completed,
    );

    let report = compare_sessions(&before, &after, None, None);

    assert_eq!(report.before_session, before.id);
    assert_eq!(report.after_session, after.id);
    let kind_of = |reference: &str| {
        report
            .changes
            .iter()
            .find(|change| change.reference == reference)
            .map(|change| change.kind)
    };
    assert_eq!(kind_of("F-001"), Some(ChangeKind::Corrige));
    assert_eq!(kind_of("SS-005"), Some(ChangeKind::Ameliore));
    assert_eq!(kind_of("IC-010"), Some(ChangeKind::Degrade));
    assert_eq!(kind_of("EF-001"), None);
    assert_eq!(kind_of("AR-002"), Some(ChangeKind::Degrade));
    assert_eq!(kind_of("FI-001"), None);

    let synthesis = &report.synthesis;
    assert_eq!((synthesis.blocking_before, synthesis.blocking_after), (1, 0));
    assert_eq!((synthesis.major_before, synthesis.major_after), (1, 1));
    assert_eq!(synthesis.corrected, 1);
    assert_eq!(synthesis.improved, 1);
    assert_eq!(synthesis.degraded, 2);
    assert_eq!(report.changes_of(ChangeKind::Degrade).count(), 2);
    assert!(report.modified_accounts.is_empty());
}

#[test]
fn new_anomaly_has_no_previous_message() {
    let before = session_with(Vec::new(), SessionStatus::Completed);
    let after = session_with(
        vec![result("S-009", Level::STRUCTURAL, anomaly(Severity::Mineur))],
        SessionStatus::Completed,
    );

    let report = compare_sessions(&before, &after, None, None);

    let change = &report.changes[0];
    assert_eq!(change.kind, ChangeKind::Degrade);
    assert_eq!(change.severity_before, Severity::Ok);
    assert!(change.message_before.is_none());
}

#[test]
fn modified_accounts_list_net_movements() {
    let before = session_with(Vec::new(), SessionStatus::Completed);
    let after = session_with(Vec::new(), SessionStatus::Completed);
    let corrected = BalanceSnapshot::new(
        "2024",
        current_entries()
            .into_iter()
            .filter(|entry| entry.account_code != "4112")
            .chain([
                line("4191", "Clients avances recues", dec!(0), dec!(300000)),
                line("4112", "Clients groupe", dec!(0.005), dec!(0)),
            ])
            .collect(),
    );

    let report = compare_sessions(&before, &after, Some(&current_snapshot()), Some(&corrected));

    let codes: Vec<&str> = report
        .modified_accounts
        .iter()
        .map(|change| change.account_code.as_str())
        .collect();
    assert_eq!(codes, vec!["4112", "4191"]);
    let client = &report.modified_accounts[0];
    assert_eq!(client.net_before, dec!(-300000));
    assert_eq!(client.delta, dec!(300000.005));
    let advance = &report.modified_accounts[1];
    assert_eq!(advance.label, "Clients avances recues");
    assert_eq!(advance.delta, dec!(-300000));
}

#[test]
fn rules_missing_after_an_interrupted_reaudit_are_skipped() {
    let before = session_with(
        vec![
            result("F-001", Level::FUNDAMENTAL, anomaly(Severity::Bloquant)),
            result("FI-001", Level::FISCAL, anomaly(Severity::Majeur)),
        ],
        SessionStatus::Completed,
    );
    let after = session_with(
        vec![result("F-001", Level::FUNDAMENTAL, anomaly(Severity::Bloquant))],
        SessionStatus::Cancelled,
    );

    let report = compare_sessions(&before, &after, None, None);

    assert!(report.changes.is_empty());
    assert_eq!(report.synthesis.blocking_after, 1);
}
