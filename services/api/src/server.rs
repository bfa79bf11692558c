use crate::cli::ServeArgs;
use crate::infra::{build_session, load_host, AppState};
use crate::routes::with_assignment_routes;
use auto_priority::assignment::TriggerEvent;
use auto_priority::config::AppConfig;
use auto_priority::error::AppError;
use auto_priority::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let host = load_host(args.roster.as_deref())?;
    info!(workers = host.worker_count(), "roster loaded");
    let session = Arc::new(build_session(&config.assignment, host)?);

    if let Some(outcome) = session.notify(TriggerEvent::WorkSettingsInitialized) {
        info!(
            status = outcome.status.label(),
            attempts = outcome.attempts,
            mutations = outcome.last_pass.mutations,
            "initial work assignment finished"
        );
    }

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        session: session.clone(),
    };

    let app = with_assignment_routes(session)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        max_attempts = config.assignment.max_attempts,
        formula_failures = config.assignment.formula_failures.label(),
        "work priority service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
