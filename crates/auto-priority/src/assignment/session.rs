use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{Priority, WorkCategory};
use super::host::WorkHost;
use super::settings::WorkSettings;
use super::supervisor::{ReassignOutcome, RetrySupervisor};

/// Host lifecycle events that can invalidate the current assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    WorkSettingsInitialized,
    WorkerSpawned,
    WorkerDespawned,
    WorkerKilled,
    WorkerResurrected,
    SkillLevelChanged,
    SettingsApplied,
}

impl TriggerEvent {
    pub const ALL: [TriggerEvent; 7] = [
        TriggerEvent::WorkSettingsInitialized,
        TriggerEvent::WorkerSpawned,
        TriggerEvent::WorkerDespawned,
        TriggerEvent::WorkerKilled,
        TriggerEvent::WorkerResurrected,
        TriggerEvent::SkillLevelChanged,
        TriggerEvent::SettingsApplied,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TriggerEvent::WorkSettingsInitialized => "work_settings_initialized",
            TriggerEvent::WorkerSpawned => "worker_spawned",
            TriggerEvent::WorkerDespawned => "worker_despawned",
            TriggerEvent::WorkerKilled => "worker_killed",
            TriggerEvent::WorkerResurrected => "worker_resurrected",
            TriggerEvent::SkillLevelChanged => "skill_level_changed",
            TriggerEvent::SettingsApplied => "settings_applied",
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TriggerEvent {
    type Err = UnknownTrigger;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        TriggerEvent::ALL
            .into_iter()
            .find(|event| event.label() == normalized)
            .ok_or_else(|| UnknownTrigger(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown trigger event '{0}'")]
pub struct UnknownTrigger(pub String);

/// Owns the configuration for one running host and serializes invocations.
///
/// Every trigger funnels into [`AutoPrioritySession::notify`]; concurrent
/// callers wait for the in-flight invocation to finish.
pub struct AutoPrioritySession<H> {
    host: Arc<H>,
    supervisor: RetrySupervisor,
    settings: Mutex<WorkSettings>,
    settings_path: Option<PathBuf>,
    subscriptions: Mutex<BTreeSet<TriggerEvent>>,
    invocation: Mutex<()>,
}

impl<H: WorkHost> AutoPrioritySession<H> {
    pub fn new(host: Arc<H>, supervisor: RetrySupervisor, settings: WorkSettings) -> Self {
        Self {
            host,
            supervisor,
            settings: Mutex::new(settings),
            settings_path: None,
            subscriptions: Mutex::new(TriggerEvent::ALL.into_iter().collect()),
            invocation: Mutex::new(()),
        }
    }

    /// Persist settings to `path` whenever they change.
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn supervisor(&self) -> &RetrySupervisor {
        &self.supervisor
    }

    pub fn settings(&self) -> WorkSettings {
        lock(&self.settings).clone()
    }

    pub fn is_subscribed(&self, event: TriggerEvent) -> bool {
        lock(&self.subscriptions).contains(&event)
    }

    /// Returns `true` if the event was not already subscribed.
    pub fn subscribe(&self, event: TriggerEvent) -> bool {
        lock(&self.subscriptions).insert(event)
    }

    /// Returns `true` if the event was subscribed.
    pub fn unsubscribe(&self, event: TriggerEvent) -> bool {
        lock(&self.subscriptions).remove(&event)
    }

    /// Run the supervisor for a subscribed event; `None` when ignored.
    pub fn notify(&self, event: TriggerEvent) -> Option<ReassignOutcome> {
        if !self.is_subscribed(event) {
            return None;
        }

        info!(event = event.label(), "reassigning work priorities");
        Some(self.reassign())
    }

    /// Report a skill record update. Only a change of level reassigns.
    pub fn skill_progressed(
        &self,
        level_before: u32,
        level_after: u32,
    ) -> Option<ReassignOutcome> {
        if level_before == level_after {
            return None;
        }
        self.notify(TriggerEvent::SkillLevelChanged)
    }

    pub fn update_category(
        &self,
        category: impl Into<WorkCategory>,
        desired_count: u32,
        priority: Priority,
    ) -> Option<ReassignOutcome> {
        let snapshot = {
            let mut settings = lock(&self.settings);
            settings.set(category, desired_count, priority);
            settings.clone()
        };
        self.persist(&snapshot);
        self.notify(TriggerEvent::SettingsApplied)
    }

    pub fn apply_settings(&self, settings: WorkSettings) -> Option<ReassignOutcome> {
        *lock(&self.settings) = settings.clone();
        self.persist(&settings);
        self.notify(TriggerEvent::SettingsApplied)
    }

    /// Run the supervisor unconditionally.
    pub fn reassign(&self) -> ReassignOutcome {
        let _guard = lock(&self.invocation);
        let settings = self.settings();
        self.supervisor.reassign(self.host.as_ref(), &settings)
    }

    fn persist(&self, settings: &WorkSettings) {
        let Some(path) = &self.settings_path else {
            return;
        };

        if let Err(error) = settings.save_to_path(path) {
            warn!(path = %path.display(), %error, "failed to persist work settings");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
