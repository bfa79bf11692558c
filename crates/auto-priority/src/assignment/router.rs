use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{Priority, WorkCategory};
use super::host::WorkHost;
use super::session::{AutoPrioritySession, TriggerEvent};
use super::settings::WorkSettings;
use super::supervisor::ReassignOutcome;

/// Router exposing configuration and trigger endpoints for a session.
pub fn assignment_router<H>(session: Arc<AutoPrioritySession<H>>) -> Router
where
    H: WorkHost + 'static,
{
    Router::new()
        .route("/api/v1/settings", get(list_settings_handler::<H>))
        .route(
            "/api/v1/settings/:category",
            put(update_settings_handler::<H>),
        )
        .route("/api/v1/triggers/:event", post(trigger_handler::<H>))
        .with_state(session)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsEntryView {
    pub category: WorkCategory,
    pub desired_count: u32,
    pub priority: Priority,
    pub active: bool,
}

impl SettingsEntryView {
    pub fn collect(settings: &WorkSettings) -> Vec<SettingsEntryView> {
        settings
            .iter()
            .map(|(category, entry)| SettingsEntryView {
                category: category.clone(),
                desired_count: entry.desired_count,
                priority: entry.priority,
                active: entry.is_active(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SettingsUpdate {
    pub desired_count: u32,
    pub priority: Priority,
}

pub(crate) async fn list_settings_handler<H>(
    State(session): State<Arc<AutoPrioritySession<H>>>,
) -> Response
where
    H: WorkHost + 'static,
{
    let entries = SettingsEntryView::collect(&session.settings());
    (StatusCode::OK, axum::Json(entries)).into_response()
}

pub(crate) async fn update_settings_handler<H>(
    State(session): State<Arc<AutoPrioritySession<H>>>,
    Path(category): Path<String>,
    axum::Json(update): axum::Json<SettingsUpdate>,
) -> Response
where
    H: WorkHost + 'static,
{
    let outcome = run_blocking(session, move |session| {
        session.update_category(category, update.desired_count, update.priority)
    })
    .await;

    match outcome {
        Ok(outcome) => outcome_response(TriggerEvent::SettingsApplied, outcome),
        Err(response) => response,
    }
}

pub(crate) async fn trigger_handler<H>(
    State(session): State<Arc<AutoPrioritySession<H>>>,
    Path(event): Path<String>,
) -> Response
where
    H: WorkHost + 'static,
{
    let event: TriggerEvent = match event.parse() {
        Ok(event) => event,
        Err(error) => {
            let payload = json!({
                "error": error.to_string(),
            });
            return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
        }
    };

    match run_blocking(session, move |session| session.notify(event)).await {
        Ok(outcome) => outcome_response(event, outcome),
        Err(response) => response,
    }
}

/// Run a session call on the blocking pool. Supervised passes are
/// synchronous and wait on the session's invocation lock.
pub async fn run_blocking<H, T, F>(
    session: Arc<AutoPrioritySession<H>>,
    call: F,
) -> Result<T, Response>
where
    H: WorkHost + 'static,
    T: Send + 'static,
    F: FnOnce(&AutoPrioritySession<H>) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(&session))
        .await
        .map_err(|error| {
            let payload = json!({
                "error": format!("work assignment task failed: {error}"),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        })
}

fn outcome_response(event: TriggerEvent, outcome: Option<ReassignOutcome>) -> Response {
    match outcome {
        Some(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        None => {
            let payload = json!({
                "event": event.label(),
                "status": "ignored",
            });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
    }
}
