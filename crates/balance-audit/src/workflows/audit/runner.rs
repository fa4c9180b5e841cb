use super::cancellation::CancellationProbe;
use super::catalog::ControlRule;
use super::domain::{ControlResult, Level};
use super::evaluator::evaluate_rule;
use super::snapshot::BalanceSnapshot;

/// Results of one level; `completed` is false when cancellation stopped it early.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelRun {
    pub results: Vec<ControlResult>,
    pub completed: bool,
}

/// Evaluates the rules of `level` in order.
///
/// Cancellation is polled before each rule; a rule that has started always
/// finishes. `on_rule_done` receives the rule reference, its 1-based index and
/// the level total.
pub fn run_level(
    level: Level,
    rules: &[ControlRule],
    current: &BalanceSnapshot,
    prior: Option<&BalanceSnapshot>,
    on_rule_done: &mut dyn FnMut(&str, usize, usize),
    cancellation: &dyn CancellationProbe,
) -> LevelRun {
    let total = rules.len();
    let mut results = Vec::with_capacity(total);

    for (index, rule) in rules.iter().enumerate() {
        if cancellation.is_cancelled() {
            tracing::info!(
                level = level.value(),
                evaluated = results.len(),
                total,
                "level interrupted by cancellation"
            );
            return LevelRun {
                results,
                completed: false,
            };
        }
        let result = evaluate_rule(rule, current, prior);
        results.push(result);
        on_rule_done(rule.reference(), index + 1, total);
    }

    LevelRun {
        results,
        completed: true,
    }
}
