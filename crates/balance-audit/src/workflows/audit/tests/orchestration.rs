use std::cell::RefCell;
use std::sync::Arc;

use rust_decimal_macros::dec;

use super::common::*;
use crate::workflows::audit::catalog::RuleCatalog;
use crate::workflows::audit::domain::{
    AuditPhase, ControlResult, Level, SessionStatus, Severity,
};
use crate::workflows::audit::orchestrator::{
    AuditObserver, AuditOrchestrator, RuleProgress, RunOptions,
};
use crate::workflows::audit::snapshot::BalanceSnapshot;
use crate::workflows::audit::{CancellationProbe, CancellationToken};

#[derive(Default)]
struct RecordingObserver {
    events: RefCell<Vec<String>>,
    progress: RefCell<Vec<RuleProgress>>,
}

impl AuditObserver for RecordingObserver {
    fn on_level_start(&self, level: Level) {
        self.events.borrow_mut().push(format!("start {level}"));
    }

    fn on_level_end(&self, level: Level, results: &[ControlResult]) {
        self.events
            .borrow_mut()
            .push(format!("end {level} ({})", results.len()));
    }

    fn on_progress(&self, progress: &RuleProgress) {
        self.progress.borrow_mut().push(progress.clone());
    }
}

#[test]
fn completed_run_covers_all_levels_in_order() {
    let orchestrator = AuditOrchestrator::new(catalog_of(two_rules_per_level()));
    let observer = RecordingObserver::default();
    let options = RunOptions::default().with_observer(&observer);

    let session = orchestrator.run(&current_snapshot(), Some(&prior_snapshot()), &options);

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.exercise, "2024");
    assert_eq!(session.phase, AuditPhase::Initial);
    assert!(session.finished_at.is_some());
    assert_eq!(session.results.len(), 18);
    assert_eq!(session.summary.global_score, 100);
    assert!(session.is_ready_for_validation());

    let levels: Vec<u8> = session.results.iter().map(|result| result.level.value()).collect();
    let mut sorted = levels.clone();
    sorted.sort();
    assert_eq!(levels, sorted);

    let events = observer.events.borrow();
    assert_eq!(events.len(), 18);
    assert_eq!(events[0], "start 0");
    assert_eq!(events[1], "end 0 (2)");
    assert_eq!(events[17], "end 8 (2)");

    let progress = observer.progress.borrow();
    assert_eq!(progress.len(), 18);
    let last = progress.last().expect("progress reported");
    assert_eq!(last.completed, 18);
    assert_eq!(last.overall_total, 18);
    assert_eq!(last.level, Level::MULTI_YEAR);
    assert_eq!((last.index, last.level_total), (2, 2));
}

#[test]
fn empty_catalog_completes_with_zero_score() {
    let orchestrator = AuditOrchestrator::new(Arc::new(RuleCatalog::empty()));
    let session = orchestrator.run(&current_snapshot(), None, &RunOptions::default());

    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.results.is_empty());
    assert_eq!(session.summary.total_controls, 0);
    assert_eq!(session.summary.global_score, 0);
    assert_eq!(session.summary.count_by_severity.len(), 5);
}

#[test]
fn cancellation_during_a_level_stops_the_run() {
    let orchestrator = AuditOrchestrator::new(catalog_of(two_rules_per_level()));
    let token = CancellationToken::new();

    struct CancelAtLevelTwo(CancellationToken);
    impl AuditObserver for CancelAtLevelTwo {
        fn on_progress(&self, progress: &RuleProgress) {
            if progress.level == Level::CONFORMITY && progress.index == 1 {
                self.0.cancel();
            }
        }
    }
    let observer = CancelAtLevelTwo(token.clone());
    let options = RunOptions::default()
        .with_observer(&observer)
        .with_cancellation(&token);

    let session = orchestrator.run(&current_snapshot(), None, &options);

    assert_eq!(session.status, SessionStatus::Cancelled);
    assert_eq!(session.results.len(), 5);
    assert_eq!(session.results.last().map(|r| r.reference.as_str()), Some("T2-1"));
    assert_eq!(session.summary.total_controls, 5);
    assert!(!session.is_ready_for_validation());
}

#[test]
fn cancellation_after_a_level_keeps_only_finished_levels() {
    let orchestrator = AuditOrchestrator::new(catalog_of(two_rules_per_level()));
    let token = CancellationToken::new();

    struct CancelAfterLevelThree(CancellationToken);
    impl AuditObserver for CancelAfterLevelThree {
        fn on_level_end(&self, level: Level, _results: &[ControlResult]) {
            if level == Level::DIRECTION {
                self.0.cancel();
            }
        }
    }
    let observer = CancelAfterLevelThree(token.clone());
    let options = RunOptions::default()
        .with_observer(&observer)
        .with_cancellation(&token);

    let session = orchestrator.run(&current_snapshot(), None, &options);

    assert_eq!(session.status, SessionStatus::Cancelled);
    assert_eq!(session.results.len(), 8);
    let levels: Vec<u8> = session.results.iter().map(|result| result.level.value()).collect();
    assert_eq!(levels, vec![0, 0, 1, 1, 2, 2, 3, 3]);
    assert_eq!(session.summary.total_controls, 8);
}

#[test]
fn cancellation_after_the_last_rule_still_completes() {
    let orchestrator = AuditOrchestrator::new(catalog_of(two_rules_per_level()));
    let token = CancellationToken::new();

    struct CancelOnLastRule(CancellationToken);
    impl AuditObserver for CancelOnLastRule {
        fn on_progress(&self, progress: &RuleProgress) {
            if progress.completed == progress.overall_total {
                self.0.cancel();
            }
        }
    }
    let observer = CancelOnLastRule(token.clone());
    let options = RunOptions::default()
        .with_observer(&observer)
        .with_cancellation(&token);

    let session = orchestrator.run(&current_snapshot(), None, &options);

    assert!(token.is_cancelled());
    assert_eq!(session.results.len(), 18);
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.is_ready_for_validation());
}

#[test]
fn cancellation_before_start_yields_empty_cancelled_session() {
    let orchestrator = AuditOrchestrator::new(standard_catalog());
    let token = CancellationToken::new();
    token.cancel();

    let options = RunOptions::default().with_cancellation(&token);
    let session = orchestrator.run(&current_snapshot(), None, &options);

    assert_eq!(session.status, SessionStatus::Cancelled);
    assert!(session.results.is_empty());
    assert!(session.input_fault.is_none());
}

#[test]
fn duplicate_accounts_reject_the_input() {
    let mut entries = current_entries();
    entries.push(line("4111", "Clients doublon", dec!(0), dec!(0)));
    let current = BalanceSnapshot::new("2024", entries);
    let orchestrator = AuditOrchestrator::new(standard_catalog());

    let session = orchestrator.run(&current, Some(&prior_snapshot()), &RunOptions::default());

    assert_eq!(session.status, SessionStatus::Cancelled);
    assert!(session.results.is_empty());
    assert_eq!(session.summary.global_score, 0);
    let fault = session.input_fault.expect("input fault recorded");
    assert!(fault.contains("4111"));
}

#[test]
fn faulty_rule_does_not_abort_the_audit() {
    let mut rules = two_rules_per_level();
    rules.push(panicking_rule("T4-9", Level::CROSS_ACCOUNT));
    let orchestrator = AuditOrchestrator::new(catalog_of(rules));

    let session = orchestrator.run(&current_snapshot(), None, &RunOptions::default());

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.results.len(), 19);
    let faulty = session.result("T4-9").expect("fault recorded");
    assert_eq!(faulty.severity(), Severity::Bloquant);
    assert_eq!(session.summary.blocking_remaining, 1);
    assert!(!session.is_ready_for_validation());
}

#[test]
fn blocking_count_matches_results() {
    let orchestrator = AuditOrchestrator::new(standard_catalog());
    let session = orchestrator.run(
        &unbalanced_snapshot(dec!(1500)),
        Some(&prior_snapshot()),
        &RunOptions::default(),
    );

    let blocking = session
        .results
        .iter()
        .filter(|result| result.severity() == Severity::Bloquant)
        .count();
    assert_eq!(session.summary.blocking_remaining, blocking);
    assert!(blocking >= 1);
    assert!(session.summary.global_score <= 100);
    assert_eq!(
        session.summary.count_by_severity.values().sum::<usize>(),
        session.summary.total_controls
    );
}

#[test]
fn repeated_runs_give_identical_results() {
    let orchestrator = AuditOrchestrator::new(standard_catalog());
    let current = current_snapshot();
    let prior = prior_snapshot();

    let first = orchestrator.run(&current, Some(&prior), &RunOptions::default());
    let second = orchestrator.run(&current, Some(&prior), &RunOptions::default());

    assert_ne!(first.id, second.id);
    assert_eq!(first.results, second.results);
    assert_eq!(first.summary, second.summary);
}

#[test]
fn standard_catalog_runs_every_level_on_a_sound_balance() {
    let orchestrator = AuditOrchestrator::new(standard_catalog());
    let options = RunOptions::default().with_phase(AuditPhase::Reaudit);

    let session = orchestrator.run(&current_snapshot(), Some(&prior_snapshot()), &options);

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.phase, AuditPhase::Reaudit);
    assert_eq!(session.results.len(), standard_catalog().len());
    assert_eq!(session.summary.by_level.len(), Level::COUNT);
    let equilibrium = session.result("F-001").expect("F-001 evaluated");
    assert_eq!(equilibrium.severity(), Severity::Ok);

    let severity_of = |reference: &str| {
        session
            .result(reference)
            .unwrap_or_else(|| panic!("{reference} evaluated"))
            .severity()
    };
    // 13x absent while the income statement is open.
    assert_eq!(severity_of("F-003"), Severity::Mineur);
    // Fourteen accounts only.
    assert_eq!(severity_of("F-009"), Severity::Mineur);
    assert_eq!(severity_of("SS-005"), Severity::Mineur);
    assert_eq!(severity_of("IC-016"), Severity::Info);
    assert_eq!(severity_of("IC-023"), Severity::Mineur);
    // 1311 carried in N-1 and missing in N.
    assert_eq!(severity_of("COMP-002"), Severity::Majeur);
    assert_eq!(severity_of("COMP-007"), Severity::Info);
    assert_eq!(severity_of("COMP-008"), Severity::Ok);
    assert_eq!(severity_of("EF-013"), Severity::Ok);
    // Profit of 2 800 000 with nothing booked on 89x.
    assert_eq!(severity_of("FI-007"), Severity::Majeur);
    assert_eq!(severity_of("AR-006"), Severity::Info);
}
