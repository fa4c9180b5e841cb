//! Session report export (JSON, CSV, HTML).
//!
//! Exports are deterministic: results keep their stored order and the only
//! timestamps rendered are the session's own.

mod csv_report;
mod html_report;
pub mod views;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::domain::{AuditSession, ControlResult};

pub use views::{Presentation, SessionReportView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Csv,
    Html,
}

impl ReportFormat {
    pub const fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Json => "application/json",
            ReportFormat::Csv => "text/csv; charset=utf-8",
            ReportFormat::Html => "text/html; charset=utf-8",
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Html => "html",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            "html" => Ok(ReportFormat::Html),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unknown report format `{0}` (expected json, csv or html)")]
    UnknownFormat(String),
    #[error("csv rendering failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("json rendering failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("report rendering failed: {0}")]
    Format(#[from] fmt::Error),
    #[error("report buffer failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders `results` of `session` in `format`.
pub fn export(
    session: &AuditSession,
    results: &[ControlResult],
    format: ReportFormat,
    presentation: &Presentation,
) -> Result<Vec<u8>, ExportError> {
    let view = SessionReportView::build(session, results, presentation);
    match format {
        ReportFormat::Json => Ok(serde_json::to_vec_pretty(&view)?),
        ReportFormat::Csv => csv_report::render(&view),
        ReportFormat::Html => html_report::render(&view),
    }
}
