//! Context-versioned interval bounds, shared by every engine of the core.
//!
//! The bound manager is the single bookkeeping layer the tightener, the
//! simplex pivots and the decision stack read and write. It keeps two copies
//! of every bound:
//!
//! - a *local* dense array, read on the hot paths;
//! - a context-dependent cell ([`Cdo`]) holding the versioned truth.
//!
//! [`BoundManager::store_local_bounds`] flushes local values into the cells
//! just before a decision level is pushed; after a pop,
//! [`BoundManager::restore_local_bounds`] reads them back. Within a level
//! both copies are updated together on every accepted tightening.
//!
//! Acceptance is monotone: a lower bound must strictly grow, an upper bound
//! strictly shrink, each beyond the comparison tolerance; anything else is
//! silently ignored. A crossing pair marks the manager infeasible and
//! records the first crossing variable; callers observe this through
//! [`BoundManager::consistent_bounds`] and raise
//! [`Error::InfeasibleQuery`](crate::error::Error::InfeasibleQuery).

use veridex_context::{Cdo, Context};

use crate::explainer::BoundExplainer;
use crate::float_utils;
use crate::sparse::{SparseRow, TableauRow};
use crate::tightening::{BoundKind, Tightening};

/// Versioned bounds for every registered variable.
pub struct BoundManager {
    context: Context,
    size: usize,

    lower_bounds: Vec<f64>,
    upper_bounds: Vec<f64>,
    stored_lower_bounds: Vec<Cdo<f64>>,
    stored_upper_bounds: Vec<Cdo<f64>>,

    tightenings: Vec<Tightening>,

    consistent: Cdo<bool>,
    inconsistent_variable: Cdo<Option<usize>>,

    explainer: Option<BoundExplainer>,
}

impl BoundManager {
    /// An empty manager attached to `context`.
    pub fn new(context: &Context) -> Self {
        Self {
            context: context.clone(),
            size: 0,
            lower_bounds: Vec::new(),
            upper_bounds: Vec::new(),
            stored_lower_bounds: Vec::new(),
            stored_upper_bounds: Vec::new(),
            tightenings: Vec::new(),
            consistent: Cdo::new(context, true),
            inconsistent_variable: Cdo::new(context, None),
            explainer: None,
        }
    }

    /// Allocate `number_of_variables` variables at `(−∞, +∞)` and clear the
    /// infeasibility flag. Must be called at context level 0.
    pub fn initialize(&mut self, number_of_variables: usize) {
        debug_assert_eq!(self.context.level(), 0);
        self.size = 0;
        self.lower_bounds.clear();
        self.upper_bounds.clear();
        self.stored_lower_bounds.clear();
        self.stored_upper_bounds.clear();
        self.tightenings.clear();
        self.consistent.set(true);
        self.inconsistent_variable.set(None);
        for _ in 0..number_of_variables {
            self.register_new_variable();
        }
    }

    /// Append a fresh variable at `(−∞, +∞)`; returns its identifier.
    pub fn register_new_variable(&mut self) -> usize {
        let variable = self.size;
        self.size += 1;
        self.lower_bounds.push(float_utils::negative_infinity());
        self.upper_bounds.push(float_utils::infinity());
        self.stored_lower_bounds
            .push(Cdo::new(&self.context, float_utils::negative_infinity()));
        self.stored_upper_bounds.push(Cdo::new(&self.context, float_utils::infinity()));
        if let Some(explainer) = &mut self.explainer {
            explainer.register_new_variable(&self.context);
        }
        variable
    }

    /// Number of registered variables.
    pub fn number_of_variables(&self) -> usize {
        self.size
    }

    /// Current lower bound of `variable`.
    #[inline]
    pub fn lower_bound(&self, variable: usize) -> f64 {
        self.lower_bounds[variable]
    }

    /// Current upper bound of `variable`.
    #[inline]
    pub fn upper_bound(&self, variable: usize) -> f64 {
        self.upper_bounds[variable]
    }

    /// The full lower-bound array, for row-oriented consumers.
    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower_bounds
    }

    /// The full upper-bound array, for row-oriented consumers.
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper_bounds
    }

    /// Accept `value` as a new lower bound iff it strictly improves the
    /// current one. Returns whether it was accepted.
    pub fn set_lower_bound(&mut self, variable: usize, value: f64) -> bool {
        debug_assert!(variable < self.size);
        if float_utils::gt(value, self.lower_bounds[variable]) {
            self.lower_bounds[variable] = value;
            self.stored_lower_bounds[variable].set(value);
            self.tightenings.push(Tightening::lower(variable, value));
            self.check_consistency(variable);
            return true;
        }
        false
    }

    /// Accept `value` as a new upper bound iff it strictly improves the
    /// current one. Returns whether it was accepted.
    pub fn set_upper_bound(&mut self, variable: usize, value: f64) -> bool {
        debug_assert!(variable < self.size);
        if float_utils::lt(value, self.upper_bounds[variable]) {
            self.upper_bounds[variable] = value;
            self.stored_upper_bounds[variable].set(value);
            self.tightenings.push(Tightening::upper(variable, value));
            self.check_consistency(variable);
            return true;
        }
        false
    }

    fn check_consistency(&mut self, variable: usize) {
        if !self.consistent_bounds_for(variable) {
            self.consistent.set(false);
            if self.inconsistent_variable.get().is_none() {
                self.inconsistent_variable.set(Some(variable));
            }
        }
    }

    /// True while no crossing pair has been recorded at the current level.
    pub fn consistent_bounds(&self) -> bool {
        self.consistent.get()
    }

    /// True when `variable`'s interval is non-empty.
    pub fn consistent_bounds_for(&self, variable: usize) -> bool {
        self.lower_bounds[variable] <= self.upper_bounds[variable]
    }

    /// The first variable whose bounds crossed, while infeasible.
    pub fn inconsistent_variable(&self) -> Option<usize> {
        self.inconsistent_variable.get()
    }

    /// Move the accepted-tightening log into `out`, emptying it here.
    pub fn drain_tightenings(&mut self, out: &mut Vec<Tightening>) {
        out.append(&mut self.tightenings);
    }

    /// Discard the pending tightening log.
    pub fn clear_tightenings(&mut self) {
        self.tightenings.clear();
    }

    /// Flush the local bound arrays into their versioned cells. Paired with
    /// a context push so the level reverts as one unit.
    pub fn store_local_bounds(&mut self) {
        for variable in 0..self.size {
            self.stored_lower_bounds[variable].set(self.lower_bounds[variable]);
            self.stored_upper_bounds[variable].set(self.upper_bounds[variable]);
        }
    }

    /// Read the versioned cells back into the local arrays. Paired with a
    /// context pop.
    pub fn restore_local_bounds(&mut self) {
        for variable in 0..self.size {
            self.lower_bounds[variable] = self.stored_lower_bounds[variable].get();
            self.upper_bounds[variable] = self.stored_upper_bounds[variable].get();
        }
    }

    // ------------------------------------------------------------------
    // Explanation support (proof mode).
    // ------------------------------------------------------------------

    /// Enable explanation tracking over `number_of_rows` constraint rows.
    pub fn initialize_explainer(&mut self, number_of_variables: usize, number_of_rows: usize) {
        debug_assert_eq!(number_of_variables, self.size);
        self.explainer = Some(BoundExplainer::new(number_of_variables, number_of_rows, &self.context));
    }

    /// True when explanation tracking is on.
    pub fn explanations_enabled(&self) -> bool {
        self.explainer.is_some()
    }

    /// Attach a certifying combination to a bound. No-op without a
    /// registered explainer.
    pub fn set_explanation(&self, explanation: SparseRow, variable: usize, kind: BoundKind) {
        if let Some(explainer) = &self.explainer {
            explainer.set_explanation(explanation, variable, kind);
        }
    }

    /// The explanation vector of a bound, if proof mode set one.
    pub fn explanation(&self, variable: usize, kind: BoundKind) -> Option<SparseRow> {
        self.explainer.as_ref().and_then(|e| e.explanation(variable, kind))
    }

    /// Make a bound's explanation trivial again.
    pub fn reset_explanation(&self, variable: usize, kind: BoundKind) {
        if let Some(explainer) = &self.explainer {
            explainer.reset_explanation(variable, kind);
        }
    }

    /// True when the bound carries no certifying combination (always true
    /// without an explainer).
    pub fn explanation_is_trivial(&self, variable: usize, kind: BoundKind) -> bool {
        self.explainer.as_ref().is_none_or(|e| e.is_trivial(variable, kind))
    }

    /// Replace all explanations with those of `other`.
    pub fn copy_explainer_content(&self, other: &BoundExplainer) {
        if let Some(explainer) = &self.explainer {
            explainer.copy_content_from(other);
        }
    }

    /// Accept a tightening derived from constraint row `row_index` with the
    /// target's coefficient `coefficient`, keeping the explanation current.
    pub fn tighten_from_constraint_row(
        &mut self,
        variable: usize,
        value: f64,
        kind: BoundKind,
        row_index: usize,
        coefficient: f64,
    ) -> bool {
        let accepted = match kind {
            BoundKind::Lower => self.set_lower_bound(variable, value),
            BoundKind::Upper => self.set_upper_bound(variable, value),
        };
        if accepted && let Some(explainer) = &self.explainer {
            let mut explanation = SparseRow::new();
            explanation.append(row_index, 1.0 / coefficient);
            explainer.set_explanation(explanation, variable, kind);
        }
        accepted
    }

    /// Accept a tightening derived from an inverted-basis row. The implicit
    /// modes cannot name a combination of original rows, so the explanation
    /// is reset rather than fabricated.
    pub fn tighten_from_basis_row(&mut self, variable: usize, value: f64, kind: BoundKind) -> bool {
        let accepted = match kind {
            BoundKind::Lower => self.set_lower_bound(variable, value),
            BoundKind::Upper => self.set_upper_bound(variable, value),
        };
        if accepted && let Some(explainer) = &self.explainer {
            explainer.reset_explanation(variable, kind);
        }
        accepted
    }

    /// Interval-arithmetic bound on `target_variable` implied by the sparse
    /// row `Σᵢ cᵢ·xᵢ = 0` under the current bounds.
    pub fn compute_sparse_row_bound(
        &self,
        row: &SparseRow,
        kind: BoundKind,
        target_variable: usize,
    ) -> f64 {
        let target_coefficient = row.get(target_variable);
        debug_assert!(target_coefficient != 0.0);

        // Interval of the remainder S = Σ_{i ≠ target} cᵢ·xᵢ.
        let mut remainder_lo = 0.0;
        let mut remainder_hi = 0.0;
        for entry in row {
            if entry.index == target_variable {
                continue;
            }
            let ci = entry.value;
            if ci > 0.0 {
                remainder_lo += ci * self.lower_bounds[entry.index];
                remainder_hi += ci * self.upper_bounds[entry.index];
            } else {
                remainder_lo += ci * self.upper_bounds[entry.index];
                remainder_hi += ci * self.lower_bounds[entry.index];
            }
        }

        // target = −S / c_target.
        let (lo, hi) = if target_coefficient > 0.0 {
            (-remainder_hi / target_coefficient, -remainder_lo / target_coefficient)
        } else {
            (-remainder_lo / target_coefficient, -remainder_hi / target_coefficient)
        };
        match kind {
            BoundKind::Lower => lo,
            BoundKind::Upper => hi,
        }
    }

    /// Interval-arithmetic bound on the left-hand side of a tableau row
    /// `y = Σᵢ cᵢ·xᵢ + β` under the current bounds.
    pub fn compute_tableau_row_bound(&self, row: &TableauRow, kind: BoundKind) -> f64 {
        let mut result = row.scalar;
        for entry in &row.entries {
            let ci = entry.coefficient;
            if ci == 0.0 {
                continue;
            }
            let bound = match (kind, ci > 0.0) {
                (BoundKind::Upper, true) | (BoundKind::Lower, false) => {
                    self.upper_bounds[entry.variable]
                }
                (BoundKind::Upper, false) | (BoundKind::Lower, true) => {
                    self.lower_bounds[entry.variable]
                }
            };
            result += ci * bound;
        }
        result
    }
}
