use balance_audit::config::AuditConfig;
use balance_audit::error::AppError;
use balance_audit::workflows::audit::{
    AuditPhase, AuditSession, BalanceSnapshot, InMemorySessionStore, JsonLinesSessionStore,
    ReportFormat, SessionStore, StoreError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Session backend selected from configuration at startup.
pub(crate) enum ConfiguredStore {
    Memory(InMemorySessionStore),
    JsonLines(JsonLinesSessionStore),
}

impl ConfiguredStore {
    pub(crate) fn from_config(config: &AuditConfig) -> Result<Self, AppError> {
        match &config.store_path {
            Some(path) => Ok(Self::JsonLines(JsonLinesSessionStore::open(path)?)),
            None => Ok(Self::Memory(InMemorySessionStore::with_capacity(
                config.store_capacity,
            ))),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Memory(_) => "memory".to_string(),
            Self::JsonLines(store) => format!("jsonl:{}", store.path().display()),
        }
    }
}

impl SessionStore for ConfiguredStore {
    fn append(&self, session: &AuditSession) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.append(session),
            Self::JsonLines(store) => store.append(session),
        }
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<AuditSession>, StoreError> {
        match self {
            Self::Memory(store) => store.list_recent(limit),
            Self::JsonLines(store) => store.list_recent(limit),
        }
    }

    fn fetch(&self, id: Uuid) -> Result<Option<AuditSession>, StoreError> {
        match self {
            Self::Memory(store) => store.fetch(id),
            Self::JsonLines(store) => store.fetch(id),
        }
    }
}

/// Reads a `{ "exercise": .., "entries": [..] }` trial balance from disk.
pub(crate) fn load_snapshot(path: &Path) -> Result<BalanceSnapshot, AppError> {
    let raw = std::fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

pub(crate) fn parse_phase(raw: &str) -> Result<AuditPhase, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "initial" => Ok(AuditPhase::Initial),
        "reaudit" | "re-audit" => Ok(AuditPhase::Reaudit),
        other => Err(format!("unknown phase '{other}' (expected initial or reaudit)")),
    }
}

pub(crate) fn parse_format(raw: &str) -> Result<ReportFormat, String> {
    raw.parse::<ReportFormat>().map_err(|err| err.to_string())
}

pub(crate) fn parse_level(raw: &str) -> Result<u8, String> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|level| *level <= 8)
        .ok_or_else(|| format!("level must be between 0 and 8, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_values() {
        assert_eq!(parse_phase("REAUDIT"), Ok(AuditPhase::Reaudit));
        assert!(parse_phase("final").is_err());
        assert_eq!(parse_format("html"), Ok(ReportFormat::Html));
        assert!(parse_format("pdf").is_err());
        assert_eq!(parse_level("8"), Ok(8));
        assert!(parse_level("9").is_err());
    }

    #[test]
    fn configured_store_defaults_to_memory() {
        let store = ConfiguredStore::from_config(&AuditConfig::default()).expect("store builds");
        assert_eq!(store.describe(), "memory");
        assert!(store.list_recent(5).expect("listing works").is_empty());
    }
}
