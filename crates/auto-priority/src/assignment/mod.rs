//! Automatic work-priority assignment.
//!
//! For every site and every configured category the engine ranks eligible
//! workers by a category formula, gives the top `desired_count` the configured
//! priority and clears the category for everyone else at the site. The retry
//! supervisor repeats whole passes until one completes without a failed
//! mutation, and the session funnels host lifecycle events into it.

pub mod domain;
pub mod engine;
pub mod formulas;
pub mod host;
pub mod roster;
pub mod router;
pub mod session;
pub mod settings;
pub mod supervisor;

#[cfg(test)]
mod tests;

pub use domain::{CategorySettings, Priority, SiteId, WorkCategory, WorkerId};
pub use engine::{
    AssignmentEngine, AssignmentFailure, AssignmentPlan, CategoryAssignment, FailureKind,
    FormulaFailurePolicy, PassReport, RankedWorker,
};
pub use formulas::{FormulaError, FormulaRegistry, ScoreFn};
pub use host::{MutationError, Site, WorkHost, Worker};
pub use roster::{
    InMemoryHost, InMemoryWorker, RosterError, RosterImporter, SiteSnapshot, WorkerRecord,
};
pub use router::{assignment_router, run_blocking};
pub use session::{AutoPrioritySession, TriggerEvent, UnknownTrigger};
pub use settings::{PersistedSettings, SettingsError, WorkSettings};
pub use supervisor::{ReassignOutcome, ReassignStatus, RetrySupervisor, DEFAULT_MAX_ATTEMPTS};
