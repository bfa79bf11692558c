use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::domain::{WorkCategory, WorkerId};
use super::host::Worker;

/// Scoring function for a category. Higher is fitter.
pub type ScoreFn = Arc<dyn Fn(&dyn Worker) -> Result<f32, FormulaError> + Send + Sync>;

/// Failure while computing one worker's score.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("worker {worker} is missing attribute '{attribute}'")]
    MissingAttribute { worker: WorkerId, attribute: String },
    #[error("formula produced a non-finite score ({value}) for worker {worker}")]
    NonFinite { worker: WorkerId, value: f32 },
    #[error("formula failed for worker {worker}: {reason}")]
    Failed { worker: WorkerId, reason: String },
}

/// Flat table of per-category scoring functions.
///
/// Categories without an entry fall back to the host's aggregate skill.
#[derive(Clone, Default)]
pub struct FormulaRegistry {
    formulas: HashMap<WorkCategory, ScoreFn>,
}

impl FormulaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the stat-based formulas for categories where
    /// raw skill is a poor proxy.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("warden", |worker| {
            attribute_mean(worker, &["negotiation_ability"])
        });
        registry.register("handling", |worker| {
            attribute_mean(worker, &["tame_animal_chance", "train_animal_chance"])
        });
        registry
    }

    /// Associate `formula` with `category`, replacing any earlier entry.
    pub fn register<F>(&mut self, category: impl Into<WorkCategory>, formula: F)
    where
        F: Fn(&dyn Worker) -> Result<f32, FormulaError> + Send + Sync + 'static,
    {
        self.formulas.insert(category.into(), Arc::new(formula));
    }

    pub fn contains(&self, category: &WorkCategory) -> bool {
        self.formulas.contains_key(category)
    }

    pub fn score_of(
        &self,
        category: &WorkCategory,
        worker: &dyn Worker,
    ) -> Result<f32, FormulaError> {
        let value = match self.formulas.get(category) {
            Some(formula) => formula(worker)?,
            None => worker.average_skill(category),
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite {
                worker: worker.id().clone(),
                value,
            })
        }
    }
}

impl fmt::Debug for FormulaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut categories: Vec<&str> = self.formulas.keys().map(WorkCategory::as_str).collect();
        categories.sort_unstable();
        f.debug_struct("FormulaRegistry")
            .field("categories", &categories)
            .finish()
    }
}

/// Arithmetic mean of named attributes; any missing attribute is an error.
pub fn attribute_mean(worker: &dyn Worker, names: &[&str]) -> Result<f32, FormulaError> {
    if names.is_empty() {
        return Ok(0.0);
    }

    let mut total = 0.0;
    for name in names {
        total += worker
            .attribute(name)
            .ok_or_else(|| FormulaError::MissingAttribute {
                worker: worker.id().clone(),
                attribute: (*name).to_string(),
            })?;
    }

    Ok(total / names.len() as f32)
}
