use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::super::domain::{
    AuditPhase, AuditSession, ControlResult, Level, LevelTally, RuleStatus, SessionStatus,
    Severity,
};

/// Labels used when rendering reports. The engine itself never looks at them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub level_names: BTreeMap<Level, String>,
    pub severity_labels: BTreeMap<Severity, String>,
    pub status_labels: BTreeMap<SessionStatus, String>,
    pub rule_status_labels: BTreeMap<RuleStatus, String>,
}

impl Default for Presentation {
    fn default() -> Self {
        let level_names = [
            "Contrôles structurels",
            "Contrôles fondamentaux",
            "Conformité OHADA",
            "Sens et montants",
            "Inter-comptes",
            "Comparaison N/N-1",
            "États financiers",
            "Contrôles fiscaux",
            "Continuité multi-exercices",
        ];
        let severity_labels = [
            (Severity::Bloquant, "Bloquant"),
            (Severity::Majeur, "Majeur"),
            (Severity::Mineur, "Mineur"),
            (Severity::Info, "Information"),
            (Severity::Ok, "Conforme"),
        ];
        let status_labels = [
            (SessionStatus::Running, "En cours"),
            (SessionStatus::Completed, "Terminé"),
            (SessionStatus::Cancelled, "Annulé"),
        ];
        let rule_status_labels = [(RuleStatus::Ok, "Conforme"), (RuleStatus::Anomalie, "Anomalie")];

        Self {
            level_names: Level::ordered()
                .zip(level_names)
                .map(|(level, name)| (level, name.to_string()))
                .collect(),
            severity_labels: severity_labels
                .into_iter()
                .map(|(severity, label)| (severity, label.to_string()))
                .collect(),
            status_labels: status_labels
                .into_iter()
                .map(|(status, label)| (status, label.to_string()))
                .collect(),
            rule_status_labels: rule_status_labels
                .into_iter()
                .map(|(status, label)| (status, label.to_string()))
                .collect(),
        }
    }
}

impl Presentation {
    /// Falls back to "Niveau n" for levels without a configured name.
    pub fn level_name(&self, level: Level) -> String {
        self.level_names
            .get(&level)
            .cloned()
            .unwrap_or_else(|| format!("Niveau {level}"))
    }

    pub fn severity_label(&self, severity: Severity) -> String {
        self.severity_labels
            .get(&severity)
            .cloned()
            .unwrap_or_else(|| severity.code().to_string())
    }

    pub fn status_label(&self, status: SessionStatus) -> String {
        self.status_labels
            .get(&status)
            .cloned()
            .unwrap_or_else(|| status.code().to_string())
    }

    pub fn rule_status_label(&self, status: RuleStatus) -> String {
        self.rule_status_labels
            .get(&status)
            .cloned()
            .unwrap_or_else(|| status.code().to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionHeaderView {
    pub session_id: Uuid,
    pub exercise: String,
    pub phase: AuditPhase,
    pub status: SessionStatus,
    pub status_label: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_fault: Option<String>,
    pub global_score: u8,
    pub total_controls: usize,
    pub blocking_remaining: usize,
    pub ready_for_validation: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeverityCountView {
    pub severity: Severity,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelSectionView {
    pub level: Level,
    pub name: String,
    pub tally: LevelTally,
    pub results: Vec<ResultView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub reference: String,
    pub name: String,
    pub status: RuleStatus,
    pub status_label: String,
    pub severity: Severity,
    pub severity_label: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regulatory_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub amounts: BTreeMap<String, rust_decimal::Decimal>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub corrective_entries: Vec<super::super::domain::JournalEntrySuggestion>,
}

/// Presentation-ready rendering of a session, shared by every format.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReportView {
    pub session: SessionHeaderView,
    pub severities: Vec<SeverityCountView>,
    pub levels: Vec<LevelSectionView>,
}

impl SessionReportView {
    /// Renders `results` as supplied; severity counts are taken from them, not the summary.
    pub fn build(
        session: &AuditSession,
        results: &[ControlResult],
        presentation: &Presentation,
    ) -> Self {
        let header = SessionHeaderView {
            session_id: session.id,
            exercise: session.exercise.clone(),
            phase: session.phase,
            status: session.status,
            status_label: presentation.status_label(session.status),
            started_at: session.started_at,
            finished_at: session.finished_at,
            input_fault: session.input_fault.clone(),
            global_score: session.summary.global_score,
            total_controls: session.summary.total_controls,
            blocking_remaining: session.summary.blocking_remaining,
            ready_for_validation: session.is_ready_for_validation(),
        };

        let severities = Severity::ordered()
            .into_iter()
            .map(|severity| SeverityCountView {
                severity,
                label: presentation.severity_label(severity),
                count: results
                    .iter()
                    .filter(|result| result.severity() == severity)
                    .count(),
            })
            .collect();

        // Sections appear in the order their first result was supplied.
        let mut sections: Vec<LevelSectionView> = Vec::new();
        for result in results {
            let position = match sections.iter().position(|section| section.level == result.level) {
                Some(position) => position,
                None => {
                    sections.push(LevelSectionView {
                        level: result.level,
                        name: presentation.level_name(result.level),
                        tally: LevelTally::default(),
                        results: Vec::new(),
                    });
                    sections.len() - 1
                }
            };
            let section = &mut sections[position];
            section.tally.total += 1;
            if result.outcome.is_anomaly() {
                section.tally.anomalies += 1;
            } else {
                section.tally.ok += 1;
            }
            section.results.push(ResultView::build(result, presentation));
        }

        Self {
            session: header,
            severities,
            levels: sections,
        }
    }
}

impl ResultView {
    pub fn build(result: &ControlResult, presentation: &Presentation) -> Self {
        let outcome = &result.outcome;
        let details = outcome.details.clone().unwrap_or_default();
        Self {
            reference: result.reference.clone(),
            name: result.name.clone(),
            status: outcome.status,
            status_label: presentation.rule_status_label(outcome.status),
            severity: outcome.severity,
            severity_label: presentation.severity_label(outcome.severity),
            message: outcome.message.clone(),
            suggestion: outcome.suggestion.clone(),
            accounts: details.accounts,
            regulatory_reference: outcome.regulatory_reference.clone(),
            description: details.description,
            amounts: details.amounts,
            corrective_entries: outcome.corrective_entries.clone(),
        }
    }
}
