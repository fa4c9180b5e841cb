use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::catalog::RuleCatalog;
use super::comparison::{compare_sessions, CorrectionReport};
use super::domain::AuditSession;
use super::orchestrator::{AuditOrchestrator, RunOptions};
use super::report::{export, ExportError, Presentation, ReportFormat};
use super::snapshot::BalanceSnapshot;
use super::store::{SessionStore, StoreError};

/// Outcome of [`AuditService::run_audit`]. A failed append never hides the session.
#[derive(Debug, Serialize)]
pub struct AuditRun {
    pub session: AuditSession,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_store_error"
    )]
    pub store_error: Option<StoreError>,
}

fn serialize_store_error<Ser>(error: &Option<StoreError>, serializer: Ser) -> Result<Ser::Ok, Ser::Error>
where
    Ser: serde::Serializer,
{
    match error {
        Some(error) => serializer.serialize_str(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Service composing the orchestrator, the session store and report presentation.
pub struct AuditService<S> {
    orchestrator: AuditOrchestrator,
    catalog: Arc<RuleCatalog>,
    store: Arc<S>,
    presentation: Arc<Presentation>,
}

impl<S> AuditService<S>
where
    S: SessionStore + 'static,
{
    pub fn new(catalog: Arc<RuleCatalog>, store: Arc<S>) -> Self {
        Self::with_presentation(catalog, store, Presentation::default())
    }

    pub fn with_presentation(
        catalog: Arc<RuleCatalog>,
        store: Arc<S>,
        presentation: Presentation,
    ) -> Self {
        Self {
            orchestrator: AuditOrchestrator::new(Arc::clone(&catalog)),
            catalog,
            store,
            presentation: Arc::new(presentation),
        }
    }

    /// Run the catalog over the snapshots and persist the closed session.
    pub fn run_audit(
        &self,
        current: &BalanceSnapshot,
        prior: Option<&BalanceSnapshot>,
        options: &RunOptions<'_>,
    ) -> AuditRun {
        let session = self.orchestrator.run(current, prior, options);
        let store_error = match self.store.append(&session) {
            Ok(()) => None,
            Err(error) => {
                tracing::warn!(
                    session_id = %session.id,
                    error = %error,
                    "audit session could not be stored"
                );
                Some(error)
            }
        };
        AuditRun {
            session,
            store_error,
        }
    }

    pub fn list_sessions(&self, limit: usize) -> Result<Vec<AuditSession>, AuditServiceError> {
        Ok(self.store.list_recent(limit)?)
    }

    pub fn get_session(&self, session_id: Uuid) -> Result<AuditSession, AuditServiceError> {
        self.store
            .fetch(session_id)?
            .ok_or(AuditServiceError::NotFound(session_id))
    }

    /// Render a stored session in `format`.
    pub fn export_report(
        &self,
        session_id: Uuid,
        format: ReportFormat,
    ) -> Result<Vec<u8>, AuditServiceError> {
        let session = self.get_session(session_id)?;
        Ok(export(&session, &session.results, format, &self.presentation)?)
    }

    /// Compare two stored sessions. Account movements need the snapshots, which
    /// sessions do not keep; use [`compare_sessions`] directly for those.
    pub fn compare(
        &self,
        before_id: Uuid,
        after_id: Uuid,
    ) -> Result<CorrectionReport, AuditServiceError> {
        let before = self.get_session(before_id)?;
        let after = self.get_session(after_id)?;
        Ok(compare_sessions(&before, &after, None, None))
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }
}

/// Error raised by the audit service.
#[derive(Debug, thiserror::Error)]
pub enum AuditServiceError {
    #[error("audit session {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
