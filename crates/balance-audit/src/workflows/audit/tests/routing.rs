use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use super::common::*;
use crate::workflows::audit::orchestrator::RunOptions;
use crate::workflows::audit::router::{
    audit_router, rules_handler, session_handler, RulesQuery,
};
use crate::workflows::audit::service::AuditService;
use crate::workflows::audit::store::JsonLinesSessionStore;

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn post_session_runs_and_stores_the_audit() {
    let (store, service) = memory_service();
    let router = audit_router(Arc::new(service));

    let body = json!({
        "current": serde_json::to_value(current_snapshot()).expect("current"),
        "prior": serde_json::to_value(prior_snapshot()).expect("prior"),
        "phase": "INITIAL",
    });
    let response = router
        .oneshot(json_request("POST", "/api/v1/audit/sessions", body))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["session"]["status"], "COMPLETED");
    assert_eq!(payload["session"]["exercise"], "2024");
    assert!(payload.get("store_error").is_none());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn store_failure_is_reported_as_multi_status() {
    let service = AuditService::new(standard_catalog(), Arc::new(UnavailableStore));
    let router = audit_router(Arc::new(service));

    let body = json!({ "current": serde_json::to_value(current_snapshot()).expect("current") });
    let response = router
        .oneshot(json_request("POST", "/api/v1/audit/sessions", body))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::MULTI_STATUS);
    let payload = read_json_body(response).await;
    assert_eq!(payload["store_error"], "session store unavailable: disk full");
    assert!(payload["session"]["results"].as_array().is_some());
}

#[tokio::test]
async fn report_endpoint_sets_content_type_per_format() {
    let (_, service) = memory_service();
    let session = service
        .run_audit(&current_snapshot(), None, &RunOptions::default())
        .session;
    let router = audit_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(get(&format!(
            "/api/v1/audit/sessions/{}/report?format=csv",
            session.id
        )))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).expect("content type"),
        "text/csv; charset=utf-8"
    );
    let csv = String::from_utf8(read_body(response).await).expect("utf-8");
    assert!(csv.starts_with(&format!("Session;{}", session.id)));

    let response = router
        .oneshot(get(&format!(
            "/api/v1/audit/sessions/{}/report?format=pdf",
            session.id
        )))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload["error"].as_str().expect("error").contains("pdf"));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let (_, service) = memory_service();
    let router = audit_router(Arc::new(service));

    let response = router
        .oneshot(get(&format!("/api/v1/audit/sessions/{}", Uuid::new_v4())))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert!(payload["error"].as_str().expect("error").contains("not found"));
}

#[tokio::test]
async fn comparison_endpoint_returns_the_synthesis() {
    let (_, service) = memory_service();
    let before = service
        .run_audit(&unbalanced_snapshot(rust_decimal_macros::dec!(1500)), None, &RunOptions::default())
        .session;
    let after = service
        .run_audit(&current_snapshot(), None, &RunOptions::default())
        .session;
    let router = audit_router(Arc::new(service));

    let response = router
        .oneshot(get(&format!(
            "/api/v1/audit/comparisons?before={}&after={}",
            before.id, after.id
        )))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["before_session"], before.id.to_string());
    assert!(payload["synthesis"]["corrected"].as_u64().expect("corrected") >= 1);
}

#[tokio::test]
async fn list_endpoint_applies_the_limit() {
    let (_, service) = memory_service();
    for _ in 0..3 {
        service.run_audit(&current_snapshot(), None, &RunOptions::default());
    }
    let router = audit_router(Arc::new(service));

    let response = router
        .oneshot(get("/api/v1/audit/sessions?limit=2"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.as_array().expect("sessions").len(), 2);
}

#[tokio::test]
async fn rules_handler_filters_by_level() {
    let (_, service) = memory_service();
    let service = Arc::new(service);

    let response = rules_handler(
        State(Arc::clone(&service)),
        Query(RulesQuery { level: Some(1) }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let rules = payload.as_array().expect("rules");
    assert!(!rules.is_empty());
    assert!(rules.iter().all(|rule| rule["level"] == 1));

    let response = rules_handler(State(service), Query(RulesQuery { level: Some(9) })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_handler_returns_stored_session() {
    let (_, service) = memory_service();
    let session = service
        .run_audit(&current_snapshot(), None, &RunOptions::default())
        .session;

    let response = session_handler(State(Arc::new(service)), Path(session.id)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["id"], session.id.to_string());
}

#[tokio::test]
async fn file_store_reads_are_served_through_the_router() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(
        JsonLinesSessionStore::open(dir.path().join("sessions.jsonl")).expect("open store"),
    );
    let service = AuditService::new(standard_catalog(), store);
    let session = service
        .run_audit(&current_snapshot(), None, &RunOptions::default())
        .session;
    let router = audit_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(get("/api/v1/audit/sessions"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload[0]["id"], session.id.to_string());

    let response = router
        .clone()
        .oneshot(get(&format!("/api/v1/audit/sessions/{}", session.id)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(get(&format!(
            "/api/v1/audit/comparisons?before={}&after={}",
            session.id, session.id
        )))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}
