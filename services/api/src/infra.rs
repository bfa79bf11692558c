use auto_priority::assignment::{
    AssignmentEngine, AutoPrioritySession, FormulaRegistry, InMemoryHost, RetrySupervisor,
    RosterImporter, WorkSettings,
};
use auto_priority::config::AssignmentConfig;
use auto_priority::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type Session = AutoPrioritySession<InMemoryHost>;

/// Settings file used when neither a flag nor `APP_SETTINGS_PATH` names one.
pub(crate) const DEFAULT_SETTINGS_FILE: &str = "work-settings.json";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) session: Arc<Session>,
}

pub(crate) fn build_supervisor(config: &AssignmentConfig) -> RetrySupervisor {
    let engine = AssignmentEngine::new(Arc::new(FormulaRegistry::standard()))
        .with_formula_policy(config.formula_failures);
    RetrySupervisor::new(engine).with_max_attempts(config.max_attempts)
}

pub(crate) fn load_host(roster: Option<&Path>) -> Result<InMemoryHost, AppError> {
    match roster {
        Some(path) => Ok(RosterImporter::from_path(path)?),
        None => Ok(InMemoryHost::new()),
    }
}

pub(crate) fn load_settings(path: Option<&Path>) -> Result<WorkSettings, AppError> {
    match path {
        Some(path) => Ok(WorkSettings::load_from_path(path)?),
        None => Ok(WorkSettings::new()),
    }
}

pub(crate) fn settings_path(explicit: Option<PathBuf>, config: &AssignmentConfig) -> PathBuf {
    explicit
        .or_else(|| config.settings_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

pub(crate) fn build_session(
    config: &AssignmentConfig,
    host: InMemoryHost,
) -> Result<Session, AppError> {
    let settings = load_settings(config.settings_path.as_deref())?;
    let session = AutoPrioritySession::new(Arc::new(host), build_supervisor(config), settings);

    Ok(match &config.settings_path {
        Some(path) => session.with_settings_path(path.clone()),
        None => session,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use auto_priority::assignment::{FormulaFailurePolicy, Priority, WorkCategory};

    fn assignment_config(settings_path: Option<PathBuf>) -> AssignmentConfig {
        AssignmentConfig {
            max_attempts: 7,
            formula_failures: FormulaFailurePolicy::RankLast,
            settings_path,
        }
    }

    #[test]
    fn supervisor_follows_assignment_config() {
        let supervisor = build_supervisor(&assignment_config(None));
        assert_eq!(supervisor.max_attempts(), 7);
        assert_eq!(
            supervisor.engine().formula_policy(),
            FormulaFailurePolicy::RankLast
        );
        assert!(supervisor
            .engine()
            .formulas()
            .contains(&WorkCategory::from("warden")));
    }

    #[test]
    fn explicit_settings_path_wins() {
        let config = assignment_config(Some(PathBuf::from("/tmp/from-env.json")));
        assert_eq!(
            settings_path(Some(PathBuf::from("flag.json")), &config),
            PathBuf::from("flag.json")
        );
        assert_eq!(
            settings_path(None, &config),
            PathBuf::from("/tmp/from-env.json")
        );
        assert_eq!(
            settings_path(None, &assignment_config(None)),
            PathBuf::from(DEFAULT_SETTINGS_FILE)
        );
    }

    #[test]
    fn session_loads_persisted_settings() {
        let path = std::env::temp_dir().join(format!(
            "auto-priority-api-{}.json",
            std::process::id()
        ));
        let mut settings = WorkSettings::new();
        settings.set("cooking", 2, Priority(1));
        settings.save_to_path(&path).expect("write settings");

        let session = build_session(&assignment_config(Some(path.clone())), InMemoryHost::new())
            .expect("session builds");
        let _ = std::fs::remove_file(&path);

        assert_eq!(session.settings(), settings);
    }
}
