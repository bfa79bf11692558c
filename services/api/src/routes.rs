use crate::infra::{AppState, Session};
use auto_priority::assignment::{
    assignment_router, run_blocking, RosterImporter, TriggerEvent, WorkerId,
};
use auto_priority::error::AppError;
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_assignment_routes(session: Arc<Session>) -> axum::Router {
    assignment_router(session)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/roster",
            axum::routing::get(roster_endpoint).post(roster_upload_endpoint),
        )
        .route(
            "/api/v1/roster/workers/:worker",
            axum::routing::delete(remove_worker_endpoint),
        )
        .route(
            "/api/v1/roster/workers/:worker/skills/:category",
            axum::routing::put(skill_update_endpoint),
        )
        .route(
            "/api/v1/roster/workers/:worker/disabled/:category",
            axum::routing::put(disabled_update_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn roster_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    Json(state.session.host().snapshot())
}

/// Add or replace the workers in a CSV body, then reassign. A rejected
/// body leaves the roster untouched.
pub(crate) async fn roster_upload_endpoint(
    Extension(state): Extension<AppState>,
    body: String,
) -> Result<Response, AppError> {
    let imported = RosterImporter::from_reader(body.as_bytes())?;
    let added = state.session.host().merge(&imported)?;

    Ok(reassign_response(
        state.session,
        TriggerEvent::WorkerSpawned,
        json!({ "added": added }),
    )
    .await)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RemovalQuery {
    #[serde(default)]
    killed: bool,
}

/// Detach a worker and reassign; `?killed=true` reports a death instead of
/// a despawn.
pub(crate) async fn remove_worker_endpoint(
    Extension(state): Extension<AppState>,
    Path(worker): Path<String>,
    Query(query): Query<RemovalQuery>,
) -> Response {
    let id = WorkerId::new(worker);
    if state.session.host().remove_worker(&id).is_none() {
        return unknown_worker(&id);
    }

    let event = if query.killed {
        TriggerEvent::WorkerKilled
    } else {
        TriggerEvent::WorkerDespawned
    };
    reassign_response(state.session, event, json!({ "removed": id })).await
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct SkillUpdate {
    level: f32,
}

pub(crate) async fn skill_update_endpoint(
    Extension(state): Extension<AppState>,
    Path((worker, category)): Path<(String, String)>,
    Json(update): Json<SkillUpdate>,
) -> Response {
    let id = WorkerId::new(worker);
    if !state.session.host().set_skill(&id, category.as_str(), update.level) {
        return unknown_worker(&id);
    }

    reassign_response(
        state.session,
        TriggerEvent::SkillLevelChanged,
        json!({ "worker": id, "category": category }),
    )
    .await
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct DisabledUpdate {
    disabled: bool,
}

/// Toggle whether a worker may take a category. Reported as a skill change
/// since it alters eligibility.
pub(crate) async fn disabled_update_endpoint(
    Extension(state): Extension<AppState>,
    Path((worker, category)): Path<(String, String)>,
    Json(update): Json<DisabledUpdate>,
) -> Response {
    let id = WorkerId::new(worker);
    if !state
        .session
        .host()
        .set_disabled(&id, category.as_str(), update.disabled)
    {
        return unknown_worker(&id);
    }

    reassign_response(
        state.session,
        TriggerEvent::SkillLevelChanged,
        json!({ "worker": id, "category": category }),
    )
    .await
}

async fn reassign_response(
    session: Arc<Session>,
    event: TriggerEvent,
    mut ignored: serde_json::Value,
) -> Response {
    match run_blocking(session, move |session| session.notify(event)).await {
        Ok(Some(outcome)) => (StatusCode::OK, Json(outcome)).into_response(),
        Ok(None) => {
            ignored["event"] = json!(event.label());
            ignored["status"] = json!("ignored");
            (StatusCode::ACCEPTED, Json(ignored)).into_response()
        }
        Err(response) => response,
    }
}

fn unknown_worker(id: &WorkerId) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("unknown worker '{id}'") })),
    )
        .into_response()
}
