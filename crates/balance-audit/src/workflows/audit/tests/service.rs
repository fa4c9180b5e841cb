use std::sync::Arc;

use uuid::Uuid;

use super::common::*;
use crate::workflows::audit::domain::{AuditPhase, SessionStatus};
use crate::workflows::audit::orchestrator::RunOptions;
use crate::workflows::audit::report::ReportFormat;
use crate::workflows::audit::service::{AuditService, AuditServiceError};
use crate::workflows::audit::store::{SessionStore, StoreError};

#[test]
fn run_audit_persists_the_closed_session() {
    let (store, service) = memory_service();

    let run = service.run_audit(&current_snapshot(), Some(&prior_snapshot()), &RunOptions::default());

    assert!(run.store_error.is_none());
    assert_eq!(run.session.status, SessionStatus::Completed);
    assert_eq!(store.len(), 1);
    let stored = service.get_session(run.session.id).expect("stored session");
    assert_eq!(stored, run.session);
}

#[test]
fn store_failure_still_returns_the_session() {
    let service = AuditService::new(standard_catalog(), Arc::new(UnavailableStore));

    let run = service.run_audit(&current_snapshot(), None, &RunOptions::default());

    assert!(matches!(run.store_error, Some(StoreError::Unavailable(_))));
    assert_eq!(run.session.results.len(), service.catalog().len());

    let payload = serde_json::to_value(&run).expect("serialize run");
    assert_eq!(payload["store_error"], "session store unavailable: disk full");
    assert_eq!(payload["session"]["status"], "COMPLETED");
}

#[test]
fn unknown_session_is_not_found() {
    let (_, service) = memory_service();
    let missing = Uuid::new_v4();

    assert!(matches!(
        service.get_session(missing),
        Err(AuditServiceError::NotFound(id)) if id == missing
    ));
    assert!(matches!(
        service.export_report(missing, ReportFormat::Csv),
        Err(AuditServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.compare(missing, Uuid::new_v4()),
        Err(AuditServiceError::NotFound(_))
    ));
}

#[test]
fn reaudit_comparison_uses_stored_sessions() {
    let (_, service) = memory_service();
    let initial = service
        .run_audit(&unbalanced_snapshot(rust_decimal_macros::dec!(1500)), None, &RunOptions::default())
        .session;
    let reaudit = service
        .run_audit(
            &current_snapshot(),
            None,
            &RunOptions::default().with_phase(AuditPhase::Reaudit),
        )
        .session;

    let report = service.compare(initial.id, reaudit.id).expect("comparison");

    assert!(report.synthesis.blocking_before > report.synthesis.blocking_after);
    assert!(report
        .changes
        .iter()
        .any(|change| change.reference == "F-001"));
    assert!(report.modified_accounts.is_empty());
}

#[test]
fn list_sessions_is_bounded_by_limit() {
    let (store, service) = memory_service();
    for _ in 0..3 {
        service.run_audit(&current_snapshot(), None, &RunOptions::default());
    }

    assert_eq!(service.list_sessions(2).expect("list").len(), 2);
    assert_eq!(store.list_recent(10).expect("list").len(), 3);
}

#[test]
fn store_errors_surface_on_reads() {
    let service = AuditService::new(standard_catalog(), Arc::new(UnavailableStore));

    assert!(matches!(
        service.list_sessions(5),
        Err(AuditServiceError::Store(StoreError::Unavailable(_)))
    ));
}
