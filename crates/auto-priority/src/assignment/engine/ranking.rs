use std::cmp::Ordering;

use super::super::domain::{WorkCategory, MANIPULATION, SIGHT};
use super::super::formulas::{FormulaError, FormulaRegistry};
use super::super::host::Worker;

/// One eligible worker's position inputs. `score` is `None` when the
/// category formula failed for this worker.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RankEntry {
    pub index: usize,
    pub score: Option<f32>,
    pub tie_break: f32,
}

pub(crate) struct Selection {
    pub ranked: Vec<RankEntry>,
    pub chosen: usize,
    pub formula_failures: Vec<(usize, FormulaError)>,
}

impl Selection {
    pub fn chosen(&self) -> &[RankEntry] {
        &self.ranked[..self.chosen]
    }
}

/// Mean of the manipulation and sight capacities. Missing or non-finite
/// values count as zero.
pub fn capacity_mean<W: Worker + ?Sized>(worker: &W) -> f32 {
    let level = |name: &str| {
        worker
            .attribute(name)
            .filter(|value| value.is_finite())
            .unwrap_or(0.0)
    };
    (level(MANIPULATION) + level(SIGHT)) / 2.0
}

/// Rank the eligible workers of a roster and keep the top `desired_count`.
///
/// Order is score descending, then capacity mean descending, then roster
/// order. Workers whose formula failed sort after every scored worker.
pub(crate) fn select<W: Worker>(
    formulas: &FormulaRegistry,
    category: &WorkCategory,
    workers: &[W],
    desired_count: usize,
) -> Selection {
    let mut ranked = Vec::new();
    let mut formula_failures = Vec::new();

    for (index, worker) in workers.iter().enumerate() {
        if !worker.is_eligible(category) {
            continue;
        }

        let score = match formulas.score_of(category, worker) {
            Ok(score) => Some(score),
            Err(error) => {
                formula_failures.push((index, error));
                None
            }
        };

        ranked.push(RankEntry {
            index,
            score,
            tie_break: capacity_mean(worker),
        });
    }

    ranked.sort_by(rank_order);
    let chosen = desired_count.min(ranked.len());

    Selection {
        ranked,
        chosen,
        formula_failures,
    }
}

fn rank_order(a: &RankEntry, b: &RankEntry) -> Ordering {
    let by_score = match (a.score, b.score) {
        (Some(left), Some(right)) => right.total_cmp(&left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_score.then_with(|| b.tie_break.total_cmp(&a.tie_break))
}
