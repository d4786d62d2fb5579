//! Pseudo-impact scoring for branching decisions.
//!
//! When the sum-of-infeasibilities local search is driving the engine, each
//! constraint accumulates a score estimating how much fixing it has reduced
//! infeasibility in the past. The decision stack consults the tracker for
//! the highest-scoring constraint that is still unfixed when the local
//! search stalls.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::constraint::PlConstraintRef;

/// Exponential-moving-average weight for score updates.
const SCORE_EMA_ALPHA: f64 = 0.5;

/// Tracks a pseudo-impact score per constraint.
#[derive(Default)]
pub struct PseudoImpactTracker {
    scores: FxHashMap<usize, f64>,
    constraints: FxHashMap<usize, PlConstraintRef>,
}

impl PseudoImpactTracker {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the constraint pool with zero scores.
    pub fn initialize(&mut self, constraints: &[PlConstraintRef]) {
        self.scores.clear();
        self.constraints.clear();
        for constraint in constraints {
            let id = constraint.borrow().id();
            self.scores.insert(id, 0.0);
            self.constraints.insert(id, Rc::clone(constraint));
        }
    }

    /// Overwrite the score of a constraint.
    pub fn set_score(&mut self, id: usize, score: f64) {
        self.scores.insert(id, score);
    }

    /// Fold `observation` into the constraint's score as an exponential
    /// moving average.
    pub fn update_score(&mut self, id: usize, observation: f64) {
        let entry = self.scores.entry(id).or_insert(0.0);
        *entry = (1.0 - SCORE_EMA_ALPHA) * *entry + SCORE_EMA_ALPHA * observation;
    }

    /// Current score of a constraint.
    pub fn score(&self, id: usize) -> f64 {
        self.scores.get(&id).copied().unwrap_or(0.0)
    }

    /// The highest-scoring constraint that is still active, if any.
    pub fn top_unfixed(&self) -> Option<PlConstraintRef> {
        self.constraints
            .values()
            .filter(|constraint| constraint.borrow().is_active())
            .max_by(|a, b| {
                let sa = self.score(a.borrow().id());
                let sb = self.score(b.borrow().id());
                sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(Rc::clone)
    }
}
