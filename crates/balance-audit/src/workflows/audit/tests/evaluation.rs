use std::cell::Cell;

use rust_decimal_macros::dec;

use super::common::*;
use crate::workflows::audit::catalog::ControlRule;
use crate::workflows::audit::domain::{
    EntryLine, EntrySide, JournalEntrySuggestion, Level, RuleOutcome, RuleStatus, Severity,
};
use crate::workflows::audit::evaluator::evaluate_rule;
use crate::workflows::audit::runner::run_level;
use crate::workflows::audit::NeverCancelled;

#[test]
fn evaluate_rule_stamps_rule_identity() {
    let rule = anomaly_rule("X-001", Level::CROSS_ACCOUNT, Severity::Majeur);
    let result = evaluate_rule(&rule, &current_snapshot(), None);

    assert_eq!(result.reference, "X-001");
    assert_eq!(result.name, "Controle X-001");
    assert_eq!(result.level, Level::CROSS_ACCOUNT);
    assert_eq!(result.status(), RuleStatus::Anomalie);
    assert_eq!(result.severity(), Severity::Majeur);
}

#[test]
fn panicking_rule_becomes_blocking_anomaly() {
    let rule = panicking_rule("X-666", Level::FISCAL);
    let result = evaluate_rule(&rule, &current_snapshot(), Some(&prior_snapshot()));

    assert_eq!(result.status(), RuleStatus::Anomalie);
    assert_eq!(result.severity(), Severity::Bloquant);
    assert!(result.message().contains("X-666"));
    assert!(result.message().contains("compte 000 introuvable"));
}

#[test]
fn inconsistent_outcomes_are_sanitised() {
    let forced_ok = ControlRule::new("X-010", Level::STRUCTURAL, "Ok force", Severity::Info, |_, _| {
        let mut outcome = RuleOutcome::ok("tout va bien");
        outcome.severity = Severity::Majeur;
        outcome
    });
    let silent_anomaly =
        ControlRule::new("X-011", Level::STRUCTURAL, "Anomalie muette", Severity::Info, |_, _| {
            let mut outcome = RuleOutcome::anomaly(Severity::Mineur, "ecart");
            outcome.severity = Severity::Ok;
            outcome
        });

    let snapshot = current_snapshot();
    let ok = evaluate_rule(&forced_ok, &snapshot, None);
    let anomaly = evaluate_rule(&silent_anomaly, &snapshot, None);

    assert_eq!(ok.severity(), Severity::Ok);
    assert_eq!(anomaly.status(), RuleStatus::Anomalie);
    assert_eq!(anomaly.severity(), Severity::Info);
}

#[test]
fn unbalanced_corrective_entries_are_dropped() {
    let rule = ControlRule::new("X-020", Level::DIRECTION, "Ecriture", Severity::Mineur, |_, _| {
        let mut outcome = RuleOutcome::anomaly(Severity::Mineur, "reclassement");
        outcome.corrective_entries.push(JournalEntrySuggestion {
            lines: vec![
                EntryLine {
                    side: EntrySide::Debit,
                    account_code: "4112".to_string(),
                    label: "Clients".to_string(),
                    amount: dec!(300000),
                },
                EntryLine {
                    side: EntrySide::Credit,
                    account_code: "4191".to_string(),
                    label: "Avances recues".to_string(),
                    amount: dec!(299000),
                },
            ],
            comment: None,
        });
        outcome.corrective_entries.push(JournalEntrySuggestion {
            lines: vec![
                EntryLine {
                    side: EntrySide::Debit,
                    account_code: "131".to_string(),
                    label: "Resultat".to_string(),
                    amount: dec!(500),
                },
                EntryLine {
                    side: EntrySide::Credit,
                    account_code: "121".to_string(),
                    label: "Report".to_string(),
                    amount: dec!(500),
                },
            ],
            comment: None,
        });
        outcome
    });

    let result = evaluate_rule(&rule, &current_snapshot(), None);

    assert_eq!(result.outcome.corrective_entries.len(), 1);
    assert_eq!(result.outcome.corrective_entries[0].lines[0].account_code, "131");
}

#[test]
fn run_level_reports_progress_in_order() {
    let rules = vec![
        ok_rule("L-1", Level::CONFORMITY),
        anomaly_rule("L-2", Level::CONFORMITY, Severity::Mineur),
        ok_rule("L-3", Level::CONFORMITY),
    ];
    let mut seen = Vec::new();
    let mut on_rule_done = |reference: &str, index: usize, total: usize| {
        seen.push((reference.to_string(), index, total));
    };

    let run = run_level(
        Level::CONFORMITY,
        &rules,
        &current_snapshot(),
        None,
        &mut on_rule_done,
        &NeverCancelled,
    );

    assert!(run.completed);
    assert_eq!(run.results.len(), 3);
    assert_eq!(
        seen,
        vec![
            ("L-1".to_string(), 1, 3),
            ("L-2".to_string(), 2, 3),
            ("L-3".to_string(), 3, 3),
        ]
    );
}

#[test]
fn run_level_stops_between_rules_when_cancelled() {
    let rules = vec![
        ok_rule("L-1", Level::CONFORMITY),
        ok_rule("L-2", Level::CONFORMITY),
        ok_rule("L-3", Level::CONFORMITY),
    ];
    let polls = Cell::new(0usize);
    let cancel_after_two = || {
        polls.set(polls.get() + 1);
        polls.get() > 2
    };

    let run = run_level(
        Level::CONFORMITY,
        &rules,
        &current_snapshot(),
        None,
        &mut |_, _, _| {},
        &cancel_after_two,
    );

    assert!(!run.completed);
    assert_eq!(run.results.len(), 2);
    assert_eq!(run.results[1].reference, "L-2");
}
