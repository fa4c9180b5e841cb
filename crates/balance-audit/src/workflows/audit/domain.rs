use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Criticality attached to every control result.
///
/// Variants are declared from least to most critical so the derived ordering
/// reads naturally: `Severity::Bloquant > Severity::Majeur > ... > Severity::Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Ok,
    Info,
    Mineur,
    Majeur,
    Bloquant,
}

impl Severity {
    /// Most critical first, the order used by reports and summaries.
    pub const fn ordered() -> [Severity; 5] {
        [
            Severity::Bloquant,
            Severity::Majeur,
            Severity::Mineur,
            Severity::Info,
            Severity::Ok,
        ]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Severity::Bloquant => "BLOQUANT",
            Severity::Majeur => "MAJEUR",
            Severity::Mineur => "MINEUR",
            Severity::Info => "INFO",
            Severity::Ok => "OK",
        }
    }

    pub const fn is_anomaly(self) -> bool {
        !matches!(self, Severity::Ok)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One of the nine ordered audit stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    pub const COUNT: usize = 9;

    pub const STRUCTURAL: Level = Level(0);
    pub const FUNDAMENTAL: Level = Level(1);
    pub const CONFORMITY: Level = Level(2);
    pub const DIRECTION: Level = Level(3);
    pub const CROSS_ACCOUNT: Level = Level(4);
    pub const YEAR_OVER_YEAR: Level = Level(5);
    pub const STATEMENTS: Level = Level(6);
    pub const FISCAL: Level = Level(7);
    pub const MULTI_YEAR: Level = Level(8);

    pub const fn new(value: u8) -> Option<Level> {
        if (value as usize) < Self::COUNT {
            Some(Level(value))
        } else {
            None
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub fn ordered() -> impl Iterator<Item = Level> {
        (0..Self::COUNT as u8).map(Level)
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Level::new(value).ok_or_else(|| format!("level {value} outside 0..=8"))
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    Ok,
    Anomalie,
}

impl RuleStatus {
    pub const fn code(self) -> &'static str {
        match self {
            RuleStatus::Ok => "OK",
            RuleStatus::Anomalie => "ANOMALIE",
        }
    }
}

/// Supporting evidence attached to an outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub amounts: BTreeMap<String, Decimal>,
}

impl OutcomeDetails {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.accounts.is_empty() && self.amounts.is_empty()
    }
}

/// What a rule returns. Build it through [`RuleOutcome::ok`] or
/// [`RuleOutcome::anomaly`] so status and severity stay consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub status: RuleStatus,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<OutcomeDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrective_entries: Vec<JournalEntrySuggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulatory_reference: Option<String>,
}

impl RuleOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: RuleStatus::Ok,
            severity: Severity::Ok,
            message: message.into(),
            details: None,
            suggestion: None,
            corrective_entries: Vec::new(),
            regulatory_reference: None,
        }
    }

    /// Anomaly at `severity`. `Severity::Ok` is raised to `Severity::Info`.
    pub fn anomaly(severity: Severity, message: impl Into<String>) -> Self {
        let severity = if severity == Severity::Ok {
            Severity::Info
        } else {
            severity
        };
        Self {
            status: RuleStatus::Anomalie,
            severity,
            message: message.into(),
            details: None,
            suggestion: None,
            corrective_entries: Vec::new(),
            regulatory_reference: None,
        }
    }

    pub fn is_anomaly(&self) -> bool {
        self.status == RuleStatus::Anomalie
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.details_mut().description = Some(description.into());
        self
    }

    pub fn with_accounts<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details_mut()
            .accounts
            .extend(accounts.into_iter().map(Into::into));
        self
    }

    pub fn with_amount(mut self, key: impl Into<String>, amount: Decimal) -> Self {
        self.details_mut().amounts.insert(key.into(), amount);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_entry(mut self, entry: Option<JournalEntrySuggestion>) -> Self {
        if let Some(entry) = entry {
            self.corrective_entries.push(entry);
        }
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.regulatory_reference = Some(reference.into());
        self
    }

    pub fn accounts(&self) -> &[String] {
        self.details
            .as_ref()
            .map(|details| details.accounts.as_slice())
            .unwrap_or(&[])
    }

    fn details_mut(&mut self) -> &mut OutcomeDetails {
        self.details.get_or_insert_with(OutcomeDetails::default)
    }
}

/// A rule outcome stamped with the identity of the rule that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResult {
    pub reference: String,
    pub name: String,
    pub level: Level,
    #[serde(flatten)]
    pub outcome: RuleOutcome,
}

impl ControlResult {
    pub fn status(&self) -> RuleStatus {
        self.outcome.status
    }

    pub fn severity(&self) -> Severity {
        self.outcome.severity
    }

    pub fn message(&self) -> &str {
        &self.outcome.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntrySide {
    Debit,
    Credit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLine {
    pub side: EntrySide,
    pub account_code: String,
    pub label: String,
    pub amount: Decimal,
}

/// Proposed adjustment. Only balanced proposals ever reach a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntrySuggestion {
    pub lines: Vec<EntryLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl JournalEntrySuggestion {
    pub fn total(&self, side: EntrySide) -> Decimal {
        self.lines
            .iter()
            .filter(|line| line.side == side)
            .map(|line| line.amount)
            .sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.lines.len() >= 2
            && self.lines.iter().all(|line| line.amount > Decimal::ZERO)
            && self.total(EntrySide::Debit) == self.total(EntrySide::Credit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Running,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub const fn code(self) -> &'static str {
        match self {
            SessionStatus::Running => "RUNNING",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Why the audit was run: the first pass on an import or a re-run after corrections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditPhase {
    #[default]
    Initial,
    Reaudit,
}

impl AuditPhase {
    pub const fn code(self) -> &'static str {
        match self {
            AuditPhase::Initial => "INITIAL",
            AuditPhase::Reaudit => "REAUDIT",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTally {
    pub total: usize,
    pub ok: usize,
    pub anomalies: usize,
}

/// Aggregates derived from a session's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub global_score: u8,
    pub total_controls: usize,
    pub count_by_severity: BTreeMap<Severity, usize>,
    pub blocking_remaining: usize,
    #[serde(default)]
    pub by_level: BTreeMap<Level, LevelTally>,
}

impl SessionSummary {
    /// Recomputes every aggregate from scratch.
    pub fn from_results(results: &[ControlResult]) -> Self {
        let mut count_by_severity: BTreeMap<Severity, usize> =
            Severity::ordered().into_iter().map(|severity| (severity, 0)).collect();
        let mut by_level: BTreeMap<Level, LevelTally> = BTreeMap::new();
        let mut ok = 0usize;

        for result in results {
            *count_by_severity.entry(result.severity()).or_default() += 1;
            let tally = by_level.entry(result.level).or_default();
            tally.total += 1;
            match result.status() {
                RuleStatus::Ok => {
                    ok += 1;
                    tally.ok += 1;
                }
                RuleStatus::Anomalie => tally.anomalies += 1,
            }
        }

        let total_controls = results.len();
        let blocking_remaining = count_by_severity
            .get(&Severity::Bloquant)
            .copied()
            .unwrap_or_default();

        Self {
            global_score: global_score(ok, total_controls),
            total_controls,
            count_by_severity,
            blocking_remaining,
            by_level,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.count_by_severity
            .get(&severity)
            .copied()
            .unwrap_or_default()
    }

    pub fn anomalies(&self) -> usize {
        self.total_controls - self.count(Severity::Ok)
    }
}

/// `round(100 * ok / total)` with halves rounded up, 0 for an empty run.
pub fn global_score(ok: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let ok = ok.min(total) as u64;
    let total = total as u64;
    ((200 * ok + total) / (2 * total)) as u8
}

/// One execution of the catalog against a snapshot pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSession {
    pub id: Uuid,
    pub phase: AuditPhase,
    pub exercise: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_fault: Option<String>,
    pub results: Vec<ControlResult>,
    pub summary: SessionSummary,
}

impl AuditSession {
    pub(crate) fn start(exercise: impl Into<String>, phase: AuditPhase) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase,
            exercise: exercise.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: SessionStatus::Running,
            input_fault: None,
            results: Vec::new(),
            summary: SessionSummary::from_results(&[]),
        }
    }

    /// Freezes the session with `status` and a summary recomputed from all results.
    pub(crate) fn close(&mut self, status: SessionStatus) {
        self.summary = SessionSummary::from_results(&self.results);
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == SessionStatus::Cancelled
    }

    /// Downstream validation gate: necessary, not sufficient.
    pub fn is_ready_for_validation(&self) -> bool {
        self.status == SessionStatus::Completed && self.summary.blocking_remaining == 0
    }

    pub fn result(&self, reference: &str) -> Option<&ControlResult> {
        self.results
            .iter()
            .find(|result| result.reference == reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamped(reference: &str, level: Level, outcome: RuleOutcome) -> ControlResult {
        ControlResult {
            reference: reference.to_string(),
            name: reference.to_string(),
            level,
            outcome,
        }
    }

    #[test]
    fn score_rounds_half_up_and_stays_bounded() {
        assert_eq!(global_score(0, 0), 0);
        assert_eq!(global_score(1, 3), 33);
        assert_eq!(global_score(2, 3), 67);
        assert_eq!(global_score(1, 8), 13);
        assert_eq!(global_score(7, 7), 100);
        assert_eq!(global_score(9, 7), 100);
    }

    #[test]
    fn severities_order_from_ok_to_blocking() {
        assert!(Severity::Bloquant > Severity::Majeur);
        assert!(Severity::Info > Severity::Ok);
        assert_eq!(Severity::ordered()[0], Severity::Bloquant);
        assert!(!Severity::Ok.is_anomaly());
    }

    #[test]
    fn anomaly_never_carries_ok_severity() {
        let outcome = RuleOutcome::anomaly(Severity::Ok, "ecart");
        assert_eq!(outcome.status, RuleStatus::Anomalie);
        assert_eq!(outcome.severity, Severity::Info);
    }

    #[test]
    fn summary_counts_every_result_once() {
        let results = vec![
            stamped("A", Level::STRUCTURAL, RuleOutcome::ok("ok")),
            stamped("B", Level::STRUCTURAL, RuleOutcome::anomaly(Severity::Bloquant, "b")),
            stamped("C", Level::FISCAL, RuleOutcome::anomaly(Severity::Mineur, "c")),
            stamped("D", Level::FISCAL, RuleOutcome::ok("ok")),
        ];

        let summary = SessionSummary::from_results(&results);

        assert_eq!(summary.total_controls, 4);
        assert_eq!(summary.global_score, 50);
        assert_eq!(summary.blocking_remaining, 1);
        assert_eq!(summary.count(Severity::Ok), 2);
        assert_eq!(summary.anomalies(), 2);
        assert_eq!(
            summary.by_level.get(&Level::FISCAL),
            Some(&LevelTally {
                total: 2,
                ok: 1,
                anomalies: 1
            })
        );
    }

    #[test]
    fn level_rejects_values_beyond_eight() {
        assert_eq!(Level::new(8), Some(Level::MULTI_YEAR));
        assert!(Level::new(9).is_none());
        assert!(Level::try_from(12u8).is_err());
    }
}
