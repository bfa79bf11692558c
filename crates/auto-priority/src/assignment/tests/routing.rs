use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::assignment::domain::Priority;
use crate::assignment::roster::InMemoryHost;
use crate::assignment::router::{assignment_router, run_blocking, trigger_handler};
use crate::assignment::session::{AutoPrioritySession, TriggerEvent};

fn shared_session(entries: &[(&str, u32, u8)]) -> Arc<AutoPrioritySession<InMemoryHost>> {
    Arc::new(AutoPrioritySession::new(
        Arc::new(tied_cooks()),
        supervisor(),
        settings(entries),
    ))
}

#[tokio::test]
async fn trigger_handler_returns_outcome() {
    let session = shared_session(&[("cooking", 2, 3)]);

    let response = trigger_handler::<InMemoryHost>(
        State(session.clone()),
        Path("worker-spawned".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("settled"));
    assert_eq!(payload.get("attempts").and_then(Value::as_u64), Some(1));
    assert_eq!(
        payload["last_pass"]["assignments"][0]["chosen"],
        json!(["b", "a"])
    );
    assert_eq!(assigned(session.host(), "cooking").len(), 2);
}

#[tokio::test]
async fn trigger_handler_accepts_ignored_events() {
    let session = shared_session(&[("cooking", 2, 3)]);
    session.unsubscribe(TriggerEvent::WorkerKilled);

    let response = trigger_handler::<InMemoryHost>(
        State(session.clone()),
        Path("worker_killed".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    assert_eq!(payload, json!({ "event": "worker_killed", "status": "ignored" }));
    assert!(assigned(session.host(), "cooking").is_empty());
}

#[tokio::test]
async fn unknown_trigger_route_returns_not_found() {
    let router = assignment_router(shared_session(&[]));

    let response = router
        .oneshot(
            Request::post("/api/v1/triggers/raid")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert!(payload
        .get("error")
        .and_then(Value::as_str)
        .is_some_and(|message| message.contains("raid")));
}

#[tokio::test]
async fn settings_route_lists_entries() {
    let router = assignment_router(shared_session(&[("cooking", 2, 3), ("mining", 0, 1)]));

    let response = router
        .oneshot(
            Request::get("/api/v1/settings")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload,
        json!([
            { "category": "cooking", "desired_count": 2, "priority": 3, "active": true },
            { "category": "mining", "desired_count": 0, "priority": 1, "active": false },
        ])
    );
}

#[tokio::test]
async fn settings_update_route_applies_and_reassigns() {
    let session = shared_session(&[]);
    let router = assignment_router(session.clone());

    let response = router
        .oneshot(
            Request::put("/api/v1/settings/cooking")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "desired_count": 1, "priority": 4 }).to_string(),
                ))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let settings = session.settings();
    assert_eq!(settings.get(&category("cooking")).priority, Priority(4));
    let assigned = assigned(session.host(), "cooking");
    assert_eq!(assigned.get(&id("b")), Some(&Priority(4)));
}

#[tokio::test]
async fn settings_update_route_rejects_malformed_payloads() {
    let router = assignment_router(shared_session(&[]));

    let response = router
        .oneshot(
            Request::put("/api/v1/settings/cooking")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"desired_count":-1,"priority":4}"#))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn session_calls_run_off_the_request_thread() {
    let session = shared_session(&[("cooking", 2, 3)]);
    let request_thread = std::thread::current().id();

    let (thread, outcome) = run_blocking(session.clone(), |session| {
        (std::thread::current().id(), session.notify(TriggerEvent::WorkerSpawned))
    })
    .await
    .expect("blocking task completes");

    assert_ne!(thread, request_thread);
    assert!(outcome.is_some_and(|outcome| outcome.is_settled()));
    assert_eq!(assigned(session.host(), "cooking").len(), 2);
}

#[tokio::test]
async fn concurrent_triggers_each_settle() {
    let session = shared_session(&[("cooking", 2, 3)]);

    let (first, second) = tokio::join!(
        trigger_handler::<InMemoryHost>(State(session.clone()), Path("worker_spawned".to_string())),
        trigger_handler::<InMemoryHost>(
            State(session.clone()),
            Path("skill_level_changed".to_string()),
        ),
    );

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(assigned(session.host(), "cooking").len(), 2);
}
