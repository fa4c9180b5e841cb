use std::sync::Arc;

use axum::response::Response;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use uuid::Uuid;

use crate::workflows::audit::catalog::{CatalogSettings, ControlRule, RuleCatalog};
use crate::workflows::audit::domain::{
    AuditPhase, AuditSession, ControlResult, Level, RuleOutcome, SessionStatus, Severity,
};
use crate::workflows::audit::service::AuditService;
use crate::workflows::audit::snapshot::{BalanceEntry, BalanceSnapshot};
use crate::workflows::audit::store::{InMemorySessionStore, SessionStore, StoreError};

pub(super) fn line(code: &str, label: &str, debit: Decimal, credit: Decimal) -> BalanceEntry {
    BalanceEntry::closing(code, label, debit, credit)
}

/// Post-closing 2023 balance: result of 500 000 carried on 131.
pub(super) fn prior_snapshot() -> BalanceSnapshot {
    BalanceSnapshot::new(
        "2023",
        vec![
            line("1011", "Capital souscrit appele verse", dec!(0), dec!(10000000)),
            line("1311", "Resultat net benefice", dec!(0), dec!(500000)),
            line("2441", "Materiel de bureau", dec!(6000000), dec!(0)),
            line("4011", "Fournisseurs", dec!(0), dec!(1500000)),
            line("4111", "Clients", dec!(3000000), dec!(0)),
            line("5211", "Banque", dec!(3000000), dec!(0)),
        ],
    )
}

/// Pre-closing 2024 balance, balanced, with a client sub-account in credit.
pub(super) fn current_snapshot() -> BalanceSnapshot {
    BalanceSnapshot::new("2024", current_entries())
}

pub(super) fn current_entries() -> Vec<BalanceEntry> {
    vec![
        line("1011", "Capital souscrit appele verse", dec!(0), dec!(10000000)),
        line("1211", "Report a nouveau crediteur", dec!(0), dec!(500000)),
        line("2441", "Materiel de bureau", dec!(6000000), dec!(0)),
        line("28441", "Amortissement materiel de bureau", dec!(0), dec!(1200000)),
        line("4011", "Fournisseurs", dec!(0), dec!(2300000)),
        line("4111", "Clients", dec!(4500000), dec!(0)),
        line("4112", "Clients groupe", dec!(0), dec!(300000)),
        line("4431", "TVA facturee sur ventes", dec!(0), dec!(900000)),
        line("5211", "Banque", dec!(7300000), dec!(0)),
        line("5711", "Caisse", dec!(200000), dec!(0)),
        line("6011", "Achats de marchandises", dec!(8000000), dec!(0)),
        line("6611", "Appointements salaires", dec!(3000000), dec!(0)),
        line("6813", "Dotations aux amortissements", dec!(1200000), dec!(0)),
        line("7011", "Ventes de marchandises", dec!(0), dec!(15000000)),
    ]
}

/// Current balance with the bank debit raised by `gap`, breaking the equilibrium.
pub(super) fn unbalanced_snapshot(gap: Decimal) -> BalanceSnapshot {
    let entries = current_entries()
        .into_iter()
        .map(|entry| {
            if entry.account_code == "5211" {
                line("5211", "Banque", entry.closing_debit + gap, dec!(0))
            } else {
                entry
            }
        })
        .collect();
    BalanceSnapshot::new("2024", entries)
}

pub(super) fn ok_rule(reference: &str, level: Level) -> ControlRule {
    ControlRule::new(reference, level, format!("Controle {reference}"), Severity::Info, |_, _| {
        RuleOutcome::ok("RAS")
    })
}

pub(super) fn anomaly_rule(reference: &str, level: Level, severity: Severity) -> ControlRule {
    ControlRule::new(reference, level, format!("Controle {reference}"), severity, move |_, _| {
        RuleOutcome::anomaly(severity, "anomalie de test")
    })
}

pub(super) fn panicking_rule(reference: &str, level: Level) -> ControlRule {
    ControlRule::new(reference, level, "Controle defaillant", Severity::Majeur, |_, _| {
        panic!("compte 000 introuvable")
    })
}

/// Two OK rules per level, eighteen in total.
pub(super) fn two_rules_per_level() -> Vec<ControlRule> {
    Level::ordered()
        .flat_map(|level| {
            [
                ok_rule(&format!("T{}-1", level.value()), level),
                ok_rule(&format!("T{}-2", level.value()), level),
            ]
        })
        .collect()
}

pub(super) fn catalog_of(rules: Vec<ControlRule>) -> Arc<RuleCatalog> {
    Arc::new(RuleCatalog::new(rules).expect("unique references"))
}

pub(super) fn standard_catalog() -> Arc<RuleCatalog> {
    Arc::new(RuleCatalog::standard(&CatalogSettings::default()))
}

pub(super) fn memory_service() -> (Arc<InMemorySessionStore>, AuditService<InMemorySessionStore>) {
    let store = Arc::new(InMemorySessionStore::new());
    let service = AuditService::new(standard_catalog(), store.clone());
    (store, service)
}

/// A closed session holding `results`, for report and comparison tests.
pub(super) fn session_with(results: Vec<ControlResult>, status: SessionStatus) -> AuditSession {
    let mut session = AuditSession::start("2024", AuditPhase::Initial);
    session.results = results;
    session.close(status);
    session
}

pub(super) fn result(reference: &str, level: Level, outcome: RuleOutcome) -> ControlResult {
    ControlResult {
        reference: reference.to_string(),
        name: format!("Controle {reference}"),
        level,
        outcome,
    }
}

pub(super) struct UnavailableStore;

impl SessionStore for UnavailableStore {
    fn append(&self, _session: &AuditSession) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    fn list_recent(&self, _limit: usize) -> Result<Vec<AuditSession>, StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    fn fetch(&self, _id: Uuid) -> Result<Option<AuditSession>, StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = read_body(response).await;
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec()
}
