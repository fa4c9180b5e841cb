use std::sync::Arc;

use super::cancellation::{CancellationProbe, NeverCancelled};
use super::catalog::RuleCatalog;
use super::domain::{AuditPhase, AuditSession, ControlResult, Level, SessionStatus};
use super::runner::run_level;
use super::snapshot::{BalanceSnapshot, SnapshotError};

/// Progress of a running audit, emitted after every evaluated rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleProgress {
    pub level: Level,
    pub reference: String,
    /// 1-based position of the rule inside its level.
    pub index: usize,
    pub level_total: usize,
    /// Rules evaluated so far across all levels.
    pub completed: usize,
    pub overall_total: usize,
}

/// Hooks invoked while an audit runs. Every method defaults to a no-op.
pub trait AuditObserver {
    fn on_level_start(&self, _level: Level) {}

    fn on_level_end(&self, _level: Level, _results: &[ControlResult]) {}

    fn on_progress(&self, _progress: &RuleProgress) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AuditObserver for NoopObserver {}

static NOOP_OBSERVER: NoopObserver = NoopObserver;
static NEVER_CANCELLED: NeverCancelled = NeverCancelled;

/// Per-run options: phase, observer and cancellation probe.
#[derive(Clone, Copy)]
pub struct RunOptions<'a> {
    pub phase: AuditPhase,
    pub observer: &'a dyn AuditObserver,
    pub cancellation: &'a dyn CancellationProbe,
}

impl Default for RunOptions<'_> {
    fn default() -> Self {
        Self {
            phase: AuditPhase::Initial,
            observer: &NOOP_OBSERVER,
            cancellation: &NEVER_CANCELLED,
        }
    }
}

impl<'a> RunOptions<'a> {
    pub fn with_phase(mut self, phase: AuditPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn AuditObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, cancellation: &'a dyn CancellationProbe) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Drives the catalog level by level over a snapshot pair.
#[derive(Debug, Clone)]
pub struct AuditOrchestrator {
    catalog: Arc<RuleCatalog>,
}

impl AuditOrchestrator {
    pub fn new(catalog: Arc<RuleCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Runs levels 0 to 8 in order and returns the closed session.
    ///
    /// The session is COMPLETED only when every level ran to the end. Invalid
    /// input yields a CANCELLED session with no results and `input_fault` set.
    pub fn run(
        &self,
        current: &BalanceSnapshot,
        prior: Option<&BalanceSnapshot>,
        options: &RunOptions<'_>,
    ) -> AuditSession {
        let mut session = AuditSession::start(current.exercise(), options.phase);

        if let Err(fault) = validate_inputs(current, prior) {
            tracing::warn!(
                session_id = %session.id,
                exercise = %session.exercise,
                fault = %fault,
                "audit input rejected"
            );
            session.input_fault = Some(fault.to_string());
            session.close(SessionStatus::Cancelled);
            return session;
        }

        tracing::info!(
            session_id = %session.id,
            exercise = %session.exercise,
            phase = options.phase.code(),
            prior = prior.map(BalanceSnapshot::exercise),
            rules = self.catalog.len(),
            "audit started"
        );

        let overall_total = self.catalog.len();
        let mut completed_rules = 0usize;
        let mut levels_completed = 0usize;

        for level in Level::ordered() {
            if options.cancellation.is_cancelled() {
                break;
            }
            options.observer.on_level_start(level);

            let rules = self.catalog.level_rules(level);
            let mut on_rule_done = |reference: &str, index: usize, level_total: usize| {
                completed_rules += 1;
                options.observer.on_progress(&RuleProgress {
                    level,
                    reference: reference.to_string(),
                    index,
                    level_total,
                    completed: completed_rules,
                    overall_total,
                });
            };
            let run = run_level(
                level,
                rules,
                current,
                prior,
                &mut on_rule_done,
                options.cancellation,
            );

            options.observer.on_level_end(level, &run.results);
            session.results.extend(run.results);

            if !run.completed {
                break;
            }
            levels_completed += 1;
            if options.cancellation.is_cancelled() {
                break;
            }
        }

        let status = if levels_completed == Level::COUNT {
            SessionStatus::Completed
        } else {
            SessionStatus::Cancelled
        };
        session.close(status);

        tracing::info!(
            session_id = %session.id,
            exercise = %session.exercise,
            status = session.status.code(),
            controls = session.summary.total_controls,
            blocking = session.summary.blocking_remaining,
            score = session.summary.global_score,
            "audit finished"
        );
        session
    }
}

fn validate_inputs(
    current: &BalanceSnapshot,
    prior: Option<&BalanceSnapshot>,
) -> Result<(), SnapshotError> {
    current.validate()?;
    if let Some(prior) = prior {
        prior.validate()?;
    }
    Ok(())
}
