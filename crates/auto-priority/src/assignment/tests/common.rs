use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::assignment::domain::{Priority, SiteId, WorkCategory, WorkerId};
use crate::assignment::engine::AssignmentEngine;
use crate::assignment::formulas::FormulaRegistry;
use crate::assignment::host::{MutationError, Site, WorkHost, Worker};
use crate::assignment::roster::{InMemoryHost, WorkerRecord};
use crate::assignment::settings::WorkSettings;
use crate::assignment::supervisor::RetrySupervisor;

pub(super) fn category(label: &str) -> WorkCategory {
    WorkCategory::from(label)
}

pub(super) fn id(label: &str) -> WorkerId {
    WorkerId::new(label)
}

pub(super) fn engine() -> AssignmentEngine {
    AssignmentEngine::new(Arc::new(FormulaRegistry::new()))
}

pub(super) fn supervisor() -> RetrySupervisor {
    RetrySupervisor::new(engine())
}

pub(super) fn settings(entries: &[(&str, u32, u8)]) -> WorkSettings {
    let mut settings = WorkSettings::new();
    for (label, desired_count, priority) in entries {
        settings.set(*label, *desired_count, Priority(*priority));
    }
    settings
}

/// Worker scored on `category` with the given manipulation/sight average.
pub(super) fn scored(id: &str, category: &str, skill: f32, capacity: f32) -> WorkerRecord {
    WorkerRecord::new(id, id.to_uppercase())
        .with_capacities(capacity, capacity)
        .with_skill(category, skill)
}

/// A(5, 0.7), B(5, 0.8), C(5, 0.6), D(2, 1.0) on a single site.
pub(super) fn tied_cooks() -> InMemoryHost {
    let host = InMemoryHost::new();
    for record in [
        scored("a", "cooking", 5.0, 0.7),
        scored("b", "cooking", 5.0, 0.8),
        scored("c", "cooking", 5.0, 0.6),
        scored("d", "cooking", 2.0, 1.0),
    ] {
        host.add_worker("base", record).expect("add worker");
    }
    host
}

pub(super) fn assigned(host: &InMemoryHost, label: &str) -> BTreeMap<WorkerId, Priority> {
    host.assigned(&category(label))
}

pub(super) fn ids(labels: &[&str]) -> Vec<WorkerId> {
    labels.iter().map(|label| id(label)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct MutationCall {
    pub worker: WorkerId,
    pub category: WorkCategory,
    pub priority: Priority,
}

/// Worker double that records every mutation request.
#[derive(Debug, Clone)]
pub(super) struct RecordingWorker {
    id: WorkerId,
    skills: BTreeMap<WorkCategory, f32>,
    disabled: BTreeSet<WorkCategory>,
    always_fail: bool,
    calls: Arc<Mutex<Vec<MutationCall>>>,
}

impl Worker for RecordingWorker {
    fn id(&self) -> &WorkerId {
        &self.id
    }

    fn is_eligible(&self, category: &WorkCategory) -> bool {
        !self.disabled.contains(category)
    }

    fn attribute(&self, _name: &str) -> Option<f32> {
        None
    }

    fn average_skill(&self, category: &WorkCategory) -> f32 {
        self.skills.get(category).copied().unwrap_or(0.0)
    }

    fn priority(&self, _category: &WorkCategory) -> Priority {
        Priority::UNASSIGNED
    }

    fn set_priority(
        &self,
        category: &WorkCategory,
        priority: Priority,
    ) -> Result<(), MutationError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(MutationCall {
                worker: self.id.clone(),
                category: category.clone(),
                priority,
            });

        if self.always_fail {
            Err(MutationError::NotReady(self.id.clone()))
        } else {
            Ok(())
        }
    }
}

/// Host double counting passes and recording mutation requests.
#[derive(Default)]
pub(super) struct RecordingHost {
    sites: Vec<(SiteId, Vec<RecordingWorker>)>,
    calls: Arc<Mutex<Vec<MutationCall>>>,
    passes: AtomicUsize,
}

impl RecordingHost {
    pub(super) fn with_worker(
        mut self,
        site: &str,
        worker: &str,
        skills: &[(&str, f32)],
        always_fail: bool,
    ) -> Self {
        let record = RecordingWorker {
            id: id(worker),
            skills: skills
                .iter()
                .map(|(label, skill)| (category(label), *skill))
                .collect(),
            disabled: BTreeSet::new(),
            always_fail,
            calls: self.calls.clone(),
        };

        let site = SiteId::new(site);
        match self.sites.iter_mut().find(|(existing, _)| *existing == site) {
            Some((_, workers)) => workers.push(record),
            None => self.sites.push((site, vec![record])),
        }
        self
    }

    pub(super) fn with_empty_site(mut self, site: &str) -> Self {
        self.sites.push((SiteId::new(site), Vec::new()));
        self
    }

    pub(super) fn calls(&self) -> Vec<MutationCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    pub(super) fn calls_for(&self, label: &str) -> Vec<MutationCall> {
        let wanted = category(label);
        self.calls()
            .into_iter()
            .filter(|call| call.category == wanted)
            .collect()
    }

    pub(super) fn passes(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }
}

impl WorkHost for RecordingHost {
    type Worker = RecordingWorker;

    fn sites(&self) -> Vec<Site<RecordingWorker>> {
        self.passes.fetch_add(1, Ordering::SeqCst);
        self.sites
            .iter()
            .map(|(site, workers)| Site::new(site.clone(), workers.clone()))
            .collect()
    }
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
