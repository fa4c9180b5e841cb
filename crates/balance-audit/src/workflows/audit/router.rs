use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::domain::{AuditPhase, Level};
use super::orchestrator::RunOptions;
use super::report::ReportFormat;
use super::service::{AuditService, AuditServiceError};
use super::snapshot::BalanceSnapshot;
use super::store::SessionStore;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 200;

/// Router builder exposing audit runs, session history, reports and the rule catalog.
pub fn audit_router<S>(service: Arc<AuditService<S>>) -> Router
where
    S: SessionStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/audit/sessions",
            post(run_handler::<S>).get(list_handler::<S>),
        )
        .route("/api/v1/audit/sessions/:session_id", get(session_handler::<S>))
        .route(
            "/api/v1/audit/sessions/:session_id/report",
            get(report_handler::<S>),
        )
        .route("/api/v1/audit/comparisons", get(comparison_handler::<S>))
        .route("/api/v1/audit/rules", get(rules_handler::<S>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct AuditRequest {
    pub current: BalanceSnapshot,
    #[serde(default)]
    pub prior: Option<BalanceSnapshot>,
    #[serde(default)]
    pub phase: AuditPhase,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReportQuery {
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ComparisonQuery {
    before: Uuid,
    after: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RulesQuery {
    pub(crate) level: Option<u8>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({
        "error": message.into(),
    });
    (status, axum::Json(payload)).into_response()
}

fn service_error_response(error: AuditServiceError) -> Response {
    match error {
        AuditServiceError::NotFound(_) => error_response(StatusCode::NOT_FOUND, error.to_string()),
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

/// Store reads and audit runs block on file I/O, so they leave the async executor.
async fn on_blocking_pool<T, F>(task: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|join_error| {
        tracing::warn!(error = %join_error, "audit task failed");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "audit task failed")
    })
}

pub(crate) async fn run_handler<S>(
    State(service): State<Arc<AuditService<S>>>,
    axum::Json(request): axum::Json<AuditRequest>,
) -> Response
where
    S: SessionStore + 'static,
{
    let AuditRequest {
        current,
        prior,
        phase,
    } = request;
    let run = match on_blocking_pool(move || {
        let options = RunOptions::default().with_phase(phase);
        service.run_audit(&current, prior.as_ref(), &options)
    })
    .await
    {
        Ok(run) => run,
        Err(response) => return response,
    };

    let status = if run.store_error.is_some() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::CREATED
    };
    (status, axum::Json(run)).into_response()
}

pub(crate) async fn list_handler<S>(
    State(service): State<Arc<AuditService<S>>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    S: SessionStore + 'static,
{
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);
    match on_blocking_pool(move || service.list_sessions(limit)).await {
        Ok(Ok(sessions)) => (StatusCode::OK, axum::Json(sessions)).into_response(),
        Ok(Err(error)) => service_error_response(error),
        Err(response) => response,
    }
}

pub(crate) async fn session_handler<S>(
    State(service): State<Arc<AuditService<S>>>,
    Path(session_id): Path<Uuid>,
) -> Response
where
    S: SessionStore + 'static,
{
    match on_blocking_pool(move || service.get_session(session_id)).await {
        Ok(Ok(session)) => (StatusCode::OK, axum::Json(session)).into_response(),
        Ok(Err(error)) => service_error_response(error),
        Err(response) => response,
    }
}

pub(crate) async fn report_handler<S>(
    State(service): State<Arc<AuditService<S>>>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> Response
where
    S: SessionStore + 'static,
{
    let format = match query.format.as_deref().unwrap_or("json").parse::<ReportFormat>() {
        Ok(format) => format,
        Err(error) => return error_response(StatusCode::BAD_REQUEST, error.to_string()),
    };
    match on_blocking_pool(move || service.export_report(session_id, format)).await {
        Ok(Ok(body)) => (
            StatusCode::OK,
            [(CONTENT_TYPE, format.content_type())],
            body,
        )
            .into_response(),
        Ok(Err(error)) => service_error_response(error),
        Err(response) => response,
    }
}

pub(crate) async fn comparison_handler<S>(
    State(service): State<Arc<AuditService<S>>>,
    Query(query): Query<ComparisonQuery>,
) -> Response
where
    S: SessionStore + 'static,
{
    let ComparisonQuery { before, after } = query;
    match on_blocking_pool(move || service.compare(before, after)).await {
        Ok(Ok(report)) => (StatusCode::OK, axum::Json(report)).into_response(),
        Ok(Err(error)) => service_error_response(error),
        Err(response) => response,
    }
}

pub(crate) async fn rules_handler<S>(
    State(service): State<Arc<AuditService<S>>>,
    Query(query): Query<RulesQuery>,
) -> Response
where
    S: SessionStore + 'static,
{
    let level = match query.level.map(Level::new) {
        None => None,
        Some(Some(level)) => Some(level),
        Some(None) => {
            return error_response(StatusCode::BAD_REQUEST, "level must be between 0 and 8")
        }
    };
    let rules = service.catalog().descriptors(level);
    (StatusCode::OK, axum::Json(rules)).into_response()
}
