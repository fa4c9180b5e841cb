use std::str::FromStr;

use serde_json::Value;

use super::common::*;
use crate::workflows::audit::domain::{
    AuditSession, Level, RuleOutcome, RuleStatus, SessionStatus, Severity,
};
use crate::workflows::audit::report::{export, ExportError, Presentation, ReportFormat};

fn audited(status: SessionStatus) -> AuditSession {
    session_with(
        vec![
            result("F-001", Level::FUNDAMENTAL, RuleOutcome::ok("Total debit / total credit: conforme")),
            result(
                "SS-005",
                Level::DIRECTION,
                RuleOutcome::anomaly(Severity::Mineur, "1 client(s) crediteur(s) pour 300 000.00")
                    .with_accounts(["4112"])
                    .with_suggestion("Reclasser au passif en avances recues (4191)"),
            ),
            result(
                "S-002",
                Level::STRUCTURAL,
                RuleOutcome::anomaly(Severity::Bloquant, "Libelle <vide> & \"douteux\""),
            ),
        ],
        status,
    )
}

fn render(session: &AuditSession, format: ReportFormat) -> String {
    let bytes = export(session, &session.results, format, &Presentation::default()).expect("export");
    String::from_utf8(bytes).expect("utf-8 report")
}

#[test]
fn formats_parse_case_insensitively() {
    assert_eq!(ReportFormat::from_str("JSON").expect("json"), ReportFormat::Json);
    assert_eq!(ReportFormat::from_str(" csv ").expect("csv"), ReportFormat::Csv);
    assert_eq!(ReportFormat::Html.content_type(), "text/html; charset=utf-8");
    assert!(matches!(
        ReportFormat::from_str("pdf"),
        Err(ExportError::UnknownFormat(format)) if format == "pdf"
    ));
}

#[test]
fn json_report_groups_results_in_supplied_order() {
    let session = audited(SessionStatus::Completed);
    let json: Value = serde_json::from_str(&render(&session, ReportFormat::Json)).expect("json");

    assert_eq!(json["session"]["status"], "COMPLETED");
    assert_eq!(json["session"]["status_label"], "Terminé");
    assert_eq!(json["session"]["blocking_remaining"], 1);
    let levels = json["levels"].as_array().expect("levels");
    let order: Vec<u64> = levels
        .iter()
        .map(|section| section["level"].as_u64().expect("level"))
        .collect();
    assert_eq!(order, vec![1, 3, 0]);
    assert_eq!(levels[0]["name"], "Contrôles fondamentaux");
    assert_eq!(levels[2]["name"], "Contrôles structurels");
    assert_eq!(levels[1]["results"][0]["accounts"][0], "4112");
    assert_eq!(levels[1]["results"][0]["status_label"], "Anomalie");
    assert_eq!(json["severities"][0]["label"], "Bloquant");
    assert_eq!(json["severities"][0]["count"], 1);
}

#[test]
fn csv_report_uses_semicolons_and_a_header_row() {
    let session = audited(SessionStatus::Completed);
    let csv = render(&session, ReportFormat::Csv);

    assert!(csv.starts_with(&format!("Session;{}", session.id)));
    assert!(csv.contains("Statut session;COMPLETED (Terminé)"));
    assert!(csv.contains("Ref;Nom;Niveau;Statut;Severite;Message;Suggestion;Comptes;Reference"));
    assert!(csv.contains("SS-005;Controle SS-005;3;ANOMALIE;Mineur;"));

    let header_row = csv
        .lines()
        .position(|line| line.starts_with("Ref;"))
        .expect("header row");
    let rows: Vec<&str> = csv.lines().skip(header_row + 1).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].starts_with("F-001;"));
    assert!(rows[2].starts_with("S-002;"));
}

#[test]
fn cancelled_status_is_visible_in_every_format() {
    let session = audited(SessionStatus::Cancelled);

    let json = render(&session, ReportFormat::Json);
    assert!(json.contains("\"CANCELLED\""));
    let csv = render(&session, ReportFormat::Csv);
    assert!(csv.contains("CANCELLED (Annulé)"));
    let html = render(&session, ReportFormat::Html);
    assert!(html.contains("status-cancelled"));
    assert!(html.contains("Annulé"));
}

#[test]
fn html_report_escapes_rule_text() {
    let session = audited(SessionStatus::Completed);
    let html = render(&session, ReportFormat::Html);

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("Libelle &lt;vide&gt; &amp; &quot;douteux&quot;"));
    assert!(!html.contains("<vide>"));
}

#[test]
fn exports_are_deterministic() {
    let session = audited(SessionStatus::Completed);

    for format in [ReportFormat::Json, ReportFormat::Csv, ReportFormat::Html] {
        assert_eq!(render(&session, format), render(&session, format));
    }
}

#[test]
fn custom_presentation_renames_levels() {
    let session = audited(SessionStatus::Completed);
    let mut presentation = Presentation::default();
    presentation
        .level_names
        .insert(Level::DIRECTION, "Sens des soldes".to_string());

    let bytes = export(&session, &session.results, ReportFormat::Html, &presentation).expect("export");
    let html = String::from_utf8(bytes).expect("utf-8");
    assert!(html.contains("Sens des soldes"));
}

#[test]
fn filtered_results_drive_sections_and_counts() {
    let session = audited(SessionStatus::Completed);
    let anomalies: Vec<_> = session
        .results
        .iter()
        .filter(|result| result.outcome.is_anomaly())
        .cloned()
        .collect();

    let bytes = export(&session, &anomalies, ReportFormat::Json, &Presentation::default())
        .expect("export");
    let json: Value = serde_json::from_slice(&bytes).expect("json");

    let order: Vec<u64> = json["levels"]
        .as_array()
        .expect("levels")
        .iter()
        .map(|section| section["level"].as_u64().expect("level"))
        .collect();
    assert_eq!(order, vec![3, 0]);
    let counts: Vec<u64> = json["severities"]
        .as_array()
        .expect("severities")
        .iter()
        .map(|count| count["count"].as_u64().expect("count"))
        .collect();
    // Bloquant, Majeur, Mineur, Info, Ok
    assert_eq!(counts, vec![1, 0, 1, 0, 0]);
}

#[test]
fn status_labels_are_keyed_by_status() {
    let mut presentation = Presentation::default();
    presentation
        .status_labels
        .insert(SessionStatus::Cancelled, "Interrompu".to_string());
    presentation
        .rule_status_labels
        .insert(RuleStatus::Anomalie, "A corriger".to_string());

    assert_eq!(presentation.status_label(SessionStatus::Cancelled), "Interrompu");
    assert_eq!(presentation.status_label(SessionStatus::Completed), "Terminé");
    assert_eq!(presentation.rule_status_label(RuleStatus::Anomalie), "A corriger");

    let session = audited(SessionStatus::Cancelled);
    let bytes = export(&session, &session.results, ReportFormat::Csv, &presentation).expect("export");
    let csv = String::from_utf8(bytes).expect("utf-8");
    assert!(csv.contains("CANCELLED (Interrompu)"));
}
