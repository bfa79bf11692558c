mod ranking;
mod report;

pub use ranking::capacity_mean;
pub use report::{
    AssignmentFailure, AssignmentPlan, CategoryAssignment, FailureKind, PassReport, RankedWorker,
};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{CategorySettings, Priority, SiteId, WorkCategory};
use super::formulas::{FormulaError, FormulaRegistry};
use super::host::{Site, WorkHost, Worker};
use super::settings::WorkSettings;
use ranking::Selection;

/// How a failing score formula affects the pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaFailurePolicy {
    /// Skip the (site, category) pair and mark the pass failed.
    #[default]
    RetryPass,
    /// Rank the worker after every scored worker and carry on.
    RankLast,
}

impl FormulaFailurePolicy {
    pub fn label(&self) -> &'static str {
        match self {
            FormulaFailurePolicy::RetryPass => "retry_pass",
            FormulaFailurePolicy::RankLast => "rank_last",
        }
    }
}

/// Ranks eligible workers per site and category and applies priorities.
///
/// Holds no state between passes; every call recomputes from the host's
/// current rosters.
#[derive(Debug, Clone)]
pub struct AssignmentEngine {
    formulas: Arc<FormulaRegistry>,
    formula_policy: FormulaFailurePolicy,
}

impl AssignmentEngine {
    pub fn new(formulas: Arc<FormulaRegistry>) -> Self {
        Self {
            formulas,
            formula_policy: FormulaFailurePolicy::default(),
        }
    }

    pub fn with_formula_policy(mut self, policy: FormulaFailurePolicy) -> Self {
        self.formula_policy = policy;
        self
    }

    pub fn formula_policy(&self) -> FormulaFailurePolicy {
        self.formula_policy
    }

    pub fn formulas(&self) -> &FormulaRegistry {
        &self.formulas
    }

    /// Compute the selection for one site and category without mutating.
    pub fn plan<W: Worker>(
        &self,
        site: &Site<W>,
        category: &WorkCategory,
        settings: CategorySettings,
    ) -> AssignmentPlan {
        let selection = self.select(site, category, settings);
        let blocked = self.blocks(&selection);

        let chosen = if blocked {
            Vec::new()
        } else {
            selection
                .chosen()
                .iter()
                .map(|entry| RankedWorker {
                    worker: site.workers[entry.index].id().clone(),
                    score: entry.score,
                    tie_break: entry.tie_break,
                })
                .collect()
        };

        let cleared = if blocked {
            Vec::new()
        } else {
            let mask = chosen_mask(&selection, site.workers.len());
            site.workers
                .iter()
                .enumerate()
                .filter(|(index, _)| !mask[*index])
                .map(|(_, worker)| worker.id().clone())
                .collect()
        };

        let formula_failures = selection
            .formula_failures
            .iter()
            .map(|(index, error)| {
                formula_failure(&site.id, category, &site.workers[*index], error)
            })
            .collect();

        AssignmentPlan {
            site: site.id.clone(),
            category: category.clone(),
            settings,
            chosen,
            cleared,
            formula_failures,
            blocked,
        }
    }

    /// Run one pass over every populated site and active category.
    ///
    /// Individual failures are recorded and do not stop the remaining
    /// workers, categories or sites.
    pub fn run_pass<H: WorkHost>(&self, host: &H, settings: &WorkSettings) -> PassReport {
        let mut report = PassReport::default();
        let active: Vec<(WorkCategory, CategorySettings)> = settings
            .active()
            .map(|(category, entry)| (category.clone(), entry))
            .collect();

        if active.is_empty() {
            return report;
        }

        for site in host.sites() {
            if site.workers.is_empty() {
                continue;
            }

            for (category, entry) in &active {
                self.assign_category(&site, category, *entry, &mut report);
            }
        }

        report
    }

    fn select<W: Worker>(
        &self,
        site: &Site<W>,
        category: &WorkCategory,
        settings: CategorySettings,
    ) -> Selection {
        let desired = usize::try_from(settings.desired_count).unwrap_or(usize::MAX);
        ranking::select(&self.formulas, category, &site.workers, desired)
    }

    fn blocks(&self, selection: &Selection) -> bool {
        self.formula_policy == FormulaFailurePolicy::RetryPass
            && !selection.formula_failures.is_empty()
    }

    fn assign_category<W: Worker>(
        &self,
        site: &Site<W>,
        category: &WorkCategory,
        settings: CategorySettings,
        report: &mut PassReport,
    ) {
        let selection = self.select(site, category, settings);

        for (index, error) in &selection.formula_failures {
            let worker = &site.workers[*index];
            warn!(
                site = %site.id,
                category = %category,
                worker = worker.display_name(),
                %error,
                "work formula failed"
            );
            let failure = formula_failure(&site.id, category, worker, error);
            match self.formula_policy {
                FormulaFailurePolicy::RetryPass => report.failures.push(failure),
                FormulaFailurePolicy::RankLast => report.warnings.push(failure),
            }
        }

        if self.blocks(&selection) {
            return;
        }

        for entry in selection.chosen() {
            apply(site, &site.workers[entry.index], category, settings.priority, report);
        }

        let mask = chosen_mask(&selection, site.workers.len());
        let mut cleared = 0;
        for (index, worker) in site.workers.iter().enumerate() {
            if mask[index] {
                continue;
            }
            apply(site, worker, category, Priority::UNASSIGNED, report);
            cleared += 1;
        }

        report.assignments.push(CategoryAssignment {
            site: site.id.clone(),
            category: category.clone(),
            priority: settings.priority,
            chosen: selection
                .chosen()
                .iter()
                .map(|entry| site.workers[entry.index].id().clone())
                .collect(),
            cleared,
        });
    }
}

fn chosen_mask(selection: &Selection, roster_len: usize) -> Vec<bool> {
    let mut mask = vec![false; roster_len];
    for entry in selection.chosen() {
        mask[entry.index] = true;
    }
    mask
}

fn apply<W: Worker>(
    site: &Site<W>,
    worker: &W,
    category: &WorkCategory,
    priority: Priority,
    report: &mut PassReport,
) {
    match worker.set_priority(category, priority) {
        Ok(()) => report.mutations += 1,
        Err(error) => {
            warn!(
                site = %site.id,
                category = %category,
                worker = worker.display_name(),
                %priority,
                %error,
                "failed to set work priority"
            );
            report.failures.push(AssignmentFailure {
                kind: FailureKind::Mutation,
                site: site.id.clone(),
                category: category.clone(),
                worker: worker.id().clone(),
                detail: error.to_string(),
            });
        }
    }
}

fn formula_failure<W: Worker>(
    site: &SiteId,
    category: &WorkCategory,
    worker: &W,
    error: &FormulaError,
) -> AssignmentFailure {
    AssignmentFailure {
        kind: FailureKind::Formula,
        site: site.clone(),
        category: category.clone(),
        worker: worker.id().clone(),
        detail: error.to_string(),
    }
}
