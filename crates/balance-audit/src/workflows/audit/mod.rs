//! Consistency audit of SYSCOHADA trial balances.
//!
//! A [`RuleCatalog`] groups declarative controls into nine ordered levels. The
//! [`AuditOrchestrator`] runs them over a current and optional prior
//! [`BalanceSnapshot`], isolating rule faults and honouring cancellation, and
//! returns a frozen [`AuditSession`]. [`AuditService`] adds persistence through a
//! [`SessionStore`], report export and correction comparison.

pub mod cancellation;
pub mod catalog;
pub mod comparison;
pub mod corrective;
pub mod domain;
pub mod evaluator;
pub mod orchestrator;
pub mod report;
pub mod router;
pub mod runner;
pub mod service;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod tests;

pub use cancellation::{CancellationProbe, CancellationToken, NeverCancelled};
pub use catalog::{
    CatalogError, CatalogSettings, ControlRule, FiscalParameters, RuleCatalog, RuleDescriptor,
    Tolerance, ToleranceBand,
};
pub use comparison::{compare_sessions, ChangeKind, CorrectionReport};
pub use corrective::EntryDraft;
pub use domain::{
    AuditPhase, AuditSession, ControlResult, EntrySide, JournalEntrySuggestion, Level,
    RuleOutcome, RuleStatus, SessionStatus, SessionSummary, Severity,
};
pub use evaluator::evaluate_rule;
pub use orchestrator::{AuditObserver, AuditOrchestrator, NoopObserver, RuleProgress, RunOptions};
pub use report::{export, ExportError, Presentation, ReportFormat};
pub use router::audit_router;
pub use runner::{run_level, LevelRun};
pub use service::{AuditRun, AuditService, AuditServiceError};
pub use snapshot::{BalanceEntry, BalanceSnapshot, SnapshotError};
pub use store::{InMemorySessionStore, JsonLinesSessionStore, SessionStore, StoreError};
