//! In-memory host implementation and CSV roster import.
//!
//! Used by the CLI and HTTP service, and as a realistic host in tests.

mod parser;

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::domain::{Priority, SiteId, WorkCategory, WorkerId};
use super::host::{MutationError, Site, WorkHost, Worker};

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("failed to read roster: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid roster CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("roster line {line}: {reason}")]
    InvalidRow { line: u64, reason: String },
    #[error("worker {worker} is listed under site {existing} and site {requested}")]
    ConflictingSite {
        worker: WorkerId,
        existing: SiteId,
        requested: SiteId,
    },
}

/// Host-side state of one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub id: WorkerId,
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, f32>,
    #[serde(default)]
    pub skills: BTreeMap<WorkCategory, f32>,
    #[serde(default)]
    pub disabled: BTreeSet<WorkCategory>,
    /// Assigned priorities only; absent means unassigned.
    #[serde(default)]
    pub priorities: BTreeMap<WorkCategory, Priority>,
    #[serde(skip)]
    pending_failures: u32,
    #[serde(skip)]
    removed: bool,
}

impl WorkerRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: WorkerId::new(id),
            name: name.into(),
            attributes: BTreeMap::new(),
            skills: BTreeMap::new(),
            disabled: BTreeSet::new(),
            priorities: BTreeMap::new(),
            pending_failures: 0,
            removed: false,
        }
    }

    pub fn with_attribute(mut self, name: &str, value: f32) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn with_capacities(self, manipulation: f32, sight: f32) -> Self {
        self.with_attribute(super::domain::MANIPULATION, manipulation)
            .with_attribute(super::domain::SIGHT, sight)
    }

    pub fn with_skill(mut self, category: impl Into<WorkCategory>, level: f32) -> Self {
        self.skills.insert(category.into(), level);
        self
    }

    pub fn with_disabled(mut self, category: impl Into<WorkCategory>) -> Self {
        self.disabled.insert(category.into());
        self
    }

    pub fn with_priority(
        mut self,
        category: impl Into<WorkCategory>,
        priority: Priority,
    ) -> Self {
        self.store_priority(category.into(), priority);
        self
    }

    pub fn priority(&self, category: &WorkCategory) -> Priority {
        self.priorities.get(category).copied().unwrap_or_default()
    }

    fn store_priority(&mut self, category: WorkCategory, priority: Priority) {
        if priority.is_assigned() {
            self.priorities.insert(category, priority);
        } else {
            self.priorities.remove(&category);
        }
    }
}

/// Handle to a worker owned by an [`InMemoryHost`].
#[derive(Debug, Clone)]
pub struct InMemoryWorker {
    id: WorkerId,
    name: String,
    record: Arc<Mutex<WorkerRecord>>,
}

impl Worker for InMemoryWorker {
    fn id(&self) -> &WorkerId {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn is_eligible(&self, category: &WorkCategory) -> bool {
        !lock(&self.record).disabled.contains(category)
    }

    fn attribute(&self, name: &str) -> Option<f32> {
        lock(&self.record).attributes.get(name).copied()
    }

    fn average_skill(&self, category: &WorkCategory) -> f32 {
        lock(&self.record)
            .skills
            .get(category)
            .copied()
            .unwrap_or(0.0)
    }

    fn priority(&self, category: &WorkCategory) -> Priority {
        lock(&self.record).priority(category)
    }

    fn set_priority(
        &self,
        category: &WorkCategory,
        priority: Priority,
    ) -> Result<(), MutationError> {
        let mut record = lock(&self.record);
        if record.removed {
            return Err(MutationError::Gone(self.id.clone()));
        }
        if record.pending_failures > 0 {
            record.pending_failures -= 1;
            return Err(MutationError::NotReady(self.id.clone()));
        }

        record.store_priority(category.clone(), priority);
        Ok(())
    }
}

/// Serializable view of one site and its workers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteSnapshot {
    pub site: SiteId,
    pub workers: Vec<WorkerRecord>,
}

type SharedRecord = Arc<Mutex<WorkerRecord>>;

/// Host that keeps every site and worker in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHost {
    sites: Arc<Mutex<BTreeMap<SiteId, Vec<SharedRecord>>>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a worker to `site`, replacing a same-id worker already there.
    /// A worker may only ever belong to one site.
    pub fn add_worker(
        &self,
        site: impl Into<SiteId>,
        record: WorkerRecord,
    ) -> Result<(), RosterError> {
        let site = site.into();
        let mut sites = lock(&self.sites);
        check_site(&sites, &site, &record.id)?;
        upsert(&mut sites, site, record);
        Ok(())
    }

    /// Add or replace every worker of `incoming`. Nothing changes unless the
    /// whole batch fits: a site conflict on any worker rejects all of them.
    pub fn merge(&self, incoming: &InMemoryHost) -> Result<usize, RosterError> {
        let batch = incoming.snapshot();
        let mut sites = lock(&self.sites);

        for snapshot in &batch {
            for record in &snapshot.workers {
                check_site(&sites, &snapshot.site, &record.id)?;
            }
        }

        let mut added = 0;
        for snapshot in batch {
            for record in snapshot.workers {
                upsert(&mut sites, snapshot.site.clone(), record);
                added += 1;
            }
        }
        Ok(added)
    }

    /// Detach a worker. Handles obtained earlier reject further mutations.
    pub fn remove_worker(&self, id: &WorkerId) -> Option<WorkerRecord> {
        let mut sites = lock(&self.sites);
        for workers in sites.values_mut() {
            if let Some(index) = workers.iter().position(|shared| lock(shared).id == *id) {
                let shared = workers.remove(index);
                let mut record = lock(&shared);
                record.removed = true;
                return Some(record.clone());
            }
        }
        None
    }

    pub fn worker(&self, id: &WorkerId) -> Option<WorkerRecord> {
        self.with_record(id, |record| record.clone())
    }

    pub fn set_skill(
        &self,
        id: &WorkerId,
        category: impl Into<WorkCategory>,
        level: f32,
    ) -> bool {
        let category = category.into();
        self.with_record(id, |record| {
            record.skills.insert(category, level);
        })
        .is_some()
    }

    pub fn set_disabled(
        &self,
        id: &WorkerId,
        category: impl Into<WorkCategory>,
        disabled: bool,
    ) -> bool {
        let category = category.into();
        self.with_record(id, |record| {
            if disabled {
                record.disabled.insert(category);
            } else {
                record.disabled.remove(&category);
            }
        })
        .is_some()
    }

    pub fn set_attribute(&self, id: &WorkerId, name: &str, value: f32) -> bool {
        self.with_record(id, |record| {
            record.attributes.insert(name.to_string(), value);
        })
        .is_some()
    }

    /// Make the next `count` priority mutations on this worker fail as if
    /// it were mid-construction or mid-teardown.
    pub fn fail_next_mutations(&self, id: &WorkerId, count: u32) -> bool {
        self.with_record(id, |record| record.pending_failures = count)
            .is_some()
    }

    /// Current nonzero priorities for `category`, keyed by worker.
    pub fn assigned(&self, category: &WorkCategory) -> BTreeMap<WorkerId, Priority> {
        let sites = lock(&self.sites);
        sites
            .values()
            .flatten()
            .filter_map(|shared| {
                let record = lock(shared);
                let priority = record.priority(category);
                priority
                    .is_assigned()
                    .then(|| (record.id.clone(), priority))
            })
            .collect()
    }

    pub fn snapshot(&self) -> Vec<SiteSnapshot> {
        let sites = lock(&self.sites);
        sites
            .iter()
            .map(|(site, workers)| SiteSnapshot {
                site: site.clone(),
                workers: workers.iter().map(|shared| lock(shared).clone()).collect(),
            })
            .collect()
    }

    pub fn worker_count(&self) -> usize {
        lock(&self.sites).values().map(Vec::len).sum()
    }

    fn with_record<T>(
        &self,
        id: &WorkerId,
        apply: impl FnOnce(&mut WorkerRecord) -> T,
    ) -> Option<T> {
        let sites = lock(&self.sites);
        let shared = sites
            .values()
            .flatten()
            .find(|shared| lock(shared).id == *id)?;
        let mut record = lock(shared);
        Some(apply(&mut record))
    }
}

impl WorkHost for InMemoryHost {
    type Worker = InMemoryWorker;

    fn sites(&self) -> Vec<Site<InMemoryWorker>> {
        let sites = lock(&self.sites);
        sites
            .iter()
            .map(|(site, workers)| {
                let handles = workers
                    .iter()
                    .map(|shared| {
                        let record = lock(shared);
                        InMemoryWorker {
                            id: record.id.clone(),
                            name: record.name.clone(),
                            record: Arc::clone(shared),
                        }
                    })
                    .collect();
                Site::new(site.clone(), handles)
            })
            .collect()
    }
}

/// Builds an [`InMemoryHost`] from a CSV export.
///
/// Expected headers: `Site,Worker,Name,Manipulation,Sight,Attributes,Category,
/// Skill,Disabled,Priority`. Only `Site` and `Worker` are required.
pub struct RosterImporter;

impl RosterImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<InMemoryHost, RosterError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<InMemoryHost, RosterError> {
        let mut sites: BTreeMap<String, String> = BTreeMap::new();
        let mut order: Vec<(String, String)> = Vec::new();
        let mut records: BTreeMap<String, WorkerRecord> = BTreeMap::new();

        for entry in parser::parse_entries(reader)? {
            match sites.get(&entry.worker) {
                Some(existing) if *existing != entry.site => {
                    return Err(RosterError::ConflictingSite {
                        worker: WorkerId::new(entry.worker),
                        existing: SiteId::new(existing.clone()),
                        requested: SiteId::new(entry.site),
                    });
                }
                Some(_) => {}
                None => {
                    sites.insert(entry.worker.clone(), entry.site.clone());
                    order.push((entry.site.clone(), entry.worker.clone()));
                }
            }

            let record = records.entry(entry.worker.clone()).or_insert_with(|| {
                WorkerRecord::new(entry.worker.clone(), entry.worker.clone())
            });
            if let Some(name) = entry.name {
                record.name = name;
            }
            record.attributes.extend(entry.attributes);

            if let Some(category) = entry.category {
                let key = WorkCategory::new(category.category);
                record.skills.insert(key.clone(), category.skill);
                if category.disabled {
                    record.disabled.insert(key.clone());
                }
                record.store_priority(key, Priority(category.priority));
            }
        }

        let host = InMemoryHost::new();
        for (site, worker) in order {
            if let Some(record) = records.remove(&worker) {
                host.add_worker(SiteId::new(site), record)?;
            }
        }
        Ok(host)
    }
}

fn check_site(
    sites: &BTreeMap<SiteId, Vec<SharedRecord>>,
    site: &SiteId,
    worker: &WorkerId,
) -> Result<(), RosterError> {
    for (existing, workers) in sites.iter() {
        if existing != site && workers.iter().any(|shared| lock(shared).id == *worker) {
            return Err(RosterError::ConflictingSite {
                worker: worker.clone(),
                existing: existing.clone(),
                requested: site.clone(),
            });
        }
    }
    Ok(())
}

fn upsert(sites: &mut BTreeMap<SiteId, Vec<SharedRecord>>, site: SiteId, record: WorkerRecord) {
    let workers = sites.entry(site).or_default();
    match workers.iter().find(|shared| lock(shared).id == record.id) {
        Some(shared) => *lock(shared) = record,
        None => workers.push(Arc::new(Mutex::new(record))),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
