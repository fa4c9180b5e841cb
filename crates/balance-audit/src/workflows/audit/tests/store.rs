use chrono::{Duration, Utc};
use tempfile::tempdir;

use super::common::*;
use crate::workflows::audit::domain::{AuditSession, Level, RuleOutcome, SessionStatus, Severity};
use crate::workflows::audit::store::{
    InMemorySessionStore, JsonLinesSessionStore, SessionStore, StoreError,
};

fn closed_session(minutes_ago: i64) -> AuditSession {
    let mut session = session_with(
        vec![
            result("F-001", Level::FUNDAMENTAL, RuleOutcome::ok("equilibre")),
            result(
                "SS-005",
                Level::DIRECTION,
                RuleOutcome::anomaly(Severity::Mineur, "client crediteur")
                    .with_accounts(["4112"])
                    .with_amount("montant_reclassement", rust_decimal_macros::dec!(300000)),
            ),
        ],
        SessionStatus::Completed,
    );
    session.started_at = Utc::now() - Duration::minutes(minutes_ago);
    session
}

#[test]
fn memory_store_lists_most_recent_first() {
    let store = InMemorySessionStore::new();
    let old = closed_session(30);
    let recent = closed_session(5);
    let middle = closed_session(10);

    for session in [&old, &recent, &middle] {
        store.append(session).expect("append");
    }

    let listed: Vec<_> = store
        .list_recent(10)
        .expect("list")
        .into_iter()
        .map(|session| session.id)
        .collect();
    assert_eq!(listed, vec![recent.id, middle.id, old.id]);
    assert_eq!(store.list_recent(1).expect("list").len(), 1);
}

#[test]
fn ties_on_start_time_favour_the_later_append() {
    let store = InMemorySessionStore::new();
    let first = closed_session(5);
    let mut second = closed_session(5);
    second.started_at = first.started_at;

    store.append(&first).expect("append");
    store.append(&second).expect("append");

    let listed = store.list_recent(2).expect("list");
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
}

#[test]
fn memory_store_rejects_duplicates_and_evicts_oldest() {
    let store = InMemorySessionStore::with_capacity(2);
    let a = closed_session(3);
    let b = closed_session(2);
    let c = closed_session(1);

    store.append(&a).expect("append a");
    assert!(matches!(store.append(&a), Err(StoreError::Conflict)));
    store.append(&b).expect("append b");
    store.append(&c).expect("append c");

    assert_eq!(store.len(), 2);
    assert!(store.fetch(a.id).expect("fetch").is_none());
    assert_eq!(store.fetch(c.id).expect("fetch"), Some(c));
}

#[test]
fn json_lines_store_survives_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("audit").join("sessions.jsonl");
    let session = closed_session(1);

    {
        let store = JsonLinesSessionStore::open(&path).expect("open");
        store.append(&session).expect("append");
        assert_eq!(store.path(), path.as_path());
    }

    let reopened = JsonLinesSessionStore::open(&path).expect("reopen");
    let fetched = reopened
        .fetch(session.id)
        .expect("fetch")
        .expect("session stored");
    assert_eq!(fetched.id, session.id);
    assert_eq!(fetched.results, session.results);
    assert_eq!(fetched.summary, session.summary);
    assert!(matches!(reopened.append(&session), Err(StoreError::Conflict)));

    let contents = std::fs::read_to_string(&path).expect("read store");
    assert_eq!(contents.lines().count(), 1);
}

#[test]
fn json_lines_store_orders_and_limits() {
    let dir = tempdir().expect("tempdir");
    let store = JsonLinesSessionStore::open(dir.path().join("sessions.jsonl")).expect("open");
    let older = closed_session(20);
    let newer = closed_session(2);
    store.append(&newer).expect("append");
    store.append(&older).expect("append");

    let listed = store.list_recent(5).expect("list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, newer.id);
    assert!(store.fetch(uuid::Uuid::new_v4()).expect("fetch").is_none());
}

#[test]
fn corrupted_line_is_reported() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("sessions.jsonl");
    std::fs::write(&path, "{not json}\n").expect("seed file");

    let error = JsonLinesSessionStore::open(&path).expect_err("corrupted file");
    assert!(matches!(error, StoreError::Serialization(_)));
}

#[test]
fn partial_trailing_record_is_dropped_and_appends_continue() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("sessions.jsonl");
    let first = closed_session(10);
    {
        let store = JsonLinesSessionStore::open(&path).expect("open");
        store.append(&first).expect("append");
    }
    let clean_len = std::fs::metadata(&path).expect("metadata").len();
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .expect("open for tearing");
    std::io::Write::write_all(&mut file, b"{\"id\":\"7c1a").expect("tear record");
    drop(file);

    let store = JsonLinesSessionStore::open(&path).expect("reopen torn file");
    assert_eq!(std::fs::metadata(&path).expect("metadata").len(), clean_len);

    let second = closed_session(1);
    store.append(&second).expect("append after repair");

    let listed: Vec<_> = store
        .list_recent(10)
        .expect("list")
        .into_iter()
        .map(|session| session.id)
        .collect();
    assert_eq!(listed, vec![second.id, first.id]);
    assert!(store.fetch(first.id).expect("fetch").is_some());
    let contents = std::fs::read_to_string(&path).expect("read store");
    assert_eq!(contents.lines().count(), 2);
}
