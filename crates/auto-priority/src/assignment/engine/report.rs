use serde::Serialize;

use super::super::domain::{CategorySettings, Priority, SiteId, WorkCategory, WorkerId};

/// Outcome of one full pass over every site and active category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassReport {
    pub assignments: Vec<CategoryAssignment>,
    /// Failures that require the pass to be repeated.
    pub failures: Vec<AssignmentFailure>,
    /// Failures absorbed without a retry.
    pub warnings: Vec<AssignmentFailure>,
    pub mutations: usize,
}

impl PassReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn assignment(
        &self,
        site: &SiteId,
        category: &WorkCategory,
    ) -> Option<&CategoryAssignment> {
        self.assignments
            .iter()
            .find(|entry| &entry.site == site && &entry.category == category)
    }
}

/// Applied selection for one (site, category) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAssignment {
    pub site: SiteId,
    pub category: WorkCategory,
    pub priority: Priority,
    /// Chosen workers in rank order.
    pub chosen: Vec<WorkerId>,
    pub cleared: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Formula,
    Mutation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentFailure {
    pub kind: FailureKind,
    pub site: SiteId,
    pub category: WorkCategory,
    pub worker: WorkerId,
    pub detail: String,
}

/// Dry-run selection for one (site, category) pair; nothing is mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentPlan {
    pub site: SiteId,
    pub category: WorkCategory,
    pub settings: CategorySettings,
    pub chosen: Vec<RankedWorker>,
    pub cleared: Vec<WorkerId>,
    pub formula_failures: Vec<AssignmentFailure>,
    /// Set when a formula failure would skip this pair's mutations.
    pub blocked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedWorker {
    pub worker: WorkerId,
    pub score: Option<f32>,
    pub tie_break: f32,
}
