use serde::Serialize;

use super::domain::{Priority, SiteId, WorkCategory, WorkerId};

/// Read and mutate access to one host-owned worker.
///
/// Handles are cheap views; the host keeps ownership of the underlying entity.
/// `set_priority` must be idempotent so a pass can be repeated safely.
pub trait Worker {
    fn id(&self) -> &WorkerId;

    /// Human-readable label used in log output.
    fn display_name(&self) -> &str {
        self.id().as_str()
    }

    fn is_eligible(&self, category: &WorkCategory) -> bool;

    /// Named continuous attribute, e.g. a capacity level or a derived stat.
    fn attribute(&self, name: &str) -> Option<f32>;

    /// Host aggregate of the skills relevant to `category`.
    fn average_skill(&self, category: &WorkCategory) -> f32;

    fn priority(&self, category: &WorkCategory) -> Priority;

    fn set_priority(&self, category: &WorkCategory, priority: Priority)
        -> Result<(), MutationError>;
}

/// Snapshot of one site's roster, already filtered by the host to workers
/// that are present and able to work.
#[derive(Debug, Clone)]
pub struct Site<W> {
    pub id: SiteId,
    pub workers: Vec<W>,
}

impl<W> Site<W> {
    pub fn new(id: impl Into<SiteId>, workers: Vec<W>) -> Self {
        Self {
            id: id.into(),
            workers,
        }
    }
}

/// Storage abstraction for the environment that owns workers and sites.
pub trait WorkHost: Send + Sync {
    type Worker: Worker;

    fn sites(&self) -> Vec<Site<Self::Worker>>;
}

/// Raised when a worker cannot accept a priority change right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum MutationError {
    #[error("worker {0} is not ready to accept work changes")]
    NotReady(WorkerId),
    #[error("worker {0} is no longer present")]
    Gone(WorkerId),
    #[error("host rejected the change: {0}")]
    Rejected(String),
}
