//! Row-based bound tightening.
//!
//! Every linear row constrains each variable occurring in it: fixing all
//! other variables to the worst end of their intervals and solving for the
//! remaining one yields a derived bound. The tightener applies this to two
//! row families:
//!
//! - rows of the original constraint matrix `A` (sparse form), and
//! - rows of the inverted-basis tableau `y = Σᵢ cᵢ·xᵢ + β`, obtained either
//!   from an explicitly computed basis inverse or column-by-column through
//!   the forward-transformation oracle.
//!
//! Updates registered while a pass is running are visible to the rows
//! examined later in the same pass, so a pass propagates chains of
//! deductions in row order. A full examination repeats passes until no new
//! bound is accepted or the configured iteration cap is reached.
//!
//! Derived bounds from the inverted-basis passes are relaxed by a small
//! rounding constant on registration, so the noise of repeated basis
//! solves cannot make two consecutive rounds oscillate.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bound_manager::BoundManager;
use crate::config::{BoundTighteningType, Config};
use crate::error::{Error, Result};
use crate::float_utils;
use crate::sparse::{RowEntry, TableauRow};
use crate::statistics::Statistics;
use crate::tableau::TableauView;
use crate::tightening::BoundKind;

/// Sign classification of a row coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Zero,
    Positive,
    Negative,
}

/// Derives tighter variable bounds from linear rows.
pub struct RowBoundTightener {
    bound_tightening_type: BoundTighteningType,
    saturation_iterations: u32,
    rounding_constant: f64,
    minimal_coefficient: f64,

    n: usize,
    m: usize,

    /// Assembled inverted-basis rows, reused across passes.
    rows: Vec<TableauRow>,
    /// Forward-transformation result buffer.
    z: Vec<f64>,
    /// Scratch: coefficient × lower bound per entry.
    ci_times_lb: Vec<f64>,
    /// Scratch: coefficient × upper bound per entry.
    ci_times_ub: Vec<f64>,
    /// Scratch: coefficient sign per entry.
    ci_sign: Vec<Sign>,

    statistics: Option<Rc<RefCell<Statistics>>>,
}

impl RowBoundTightener {
    /// A tightener configured from `config`, with no dimensions yet.
    pub fn new(config: &Config) -> Self {
        Self {
            bound_tightening_type: config.bound_tightening_type,
            saturation_iterations: config.row_bound_tightener_saturation_iterations.max(1),
            rounding_constant: config.bound_tightening_rounding_constant,
            minimal_coefficient: config.minimal_coefficient_for_tightening,
            n: 0,
            m: 0,
            rows: Vec::new(),
            z: Vec::new(),
            ci_times_lb: Vec::new(),
            ci_times_ub: Vec::new(),
            ci_sign: Vec::new(),
            statistics: None,
        }
    }

    /// Inject the statistics sink.
    pub fn set_statistics(&mut self, statistics: Rc<RefCell<Statistics>>) {
        self.statistics = Some(statistics);
    }

    /// Size the scratch buffers to the tableau's dimensions. Called once at
    /// setup and again whenever the problem dimensions change.
    pub fn set_dimensions(&mut self, tableau: &dyn TableauView) {
        self.n = tableau.n();
        self.m = tableau.m();
        self.ci_times_lb = vec![0.0; self.n];
        self.ci_times_ub = vec![0.0; self.n];
        self.ci_sign = vec![Sign::Zero; self.n];
        self.rows.clear();
        self.z.clear();
        if self.bound_tightening_type != BoundTighteningType::ConstraintMatrix {
            self.ensure_inverted_basis_buffers();
        }
    }

    fn ensure_inverted_basis_buffers(&mut self) {
        let width = self.n - self.m;
        if self.rows.len() != self.m || self.rows.first().is_some_and(|r| r.width() != width) {
            self.rows = (0..self.m).map(|_| TableauRow::new(width)).collect();
        }
        if self.z.len() != self.m {
            self.z = vec![0.0; self.m];
        }
    }

    fn ensure_dimensions(&mut self, tableau: &dyn TableauView) {
        if self.n != tableau.n() || self.m != tableau.m() {
            self.set_dimensions(tableau);
        }
    }

    /// Run the pass selected by the configured tightening type.
    pub fn examine(
        &mut self,
        tableau: &dyn TableauView,
        bounds: &mut BoundManager,
        until_saturation: bool,
    ) -> Result<()> {
        match self.bound_tightening_type {
            BoundTighteningType::ConstraintMatrix => {
                self.examine_constraint_matrix(tableau, bounds, until_saturation)
            }
            BoundTighteningType::ComputeInvertedBasis => {
                self.examine_inverted_basis_matrix(tableau, bounds, until_saturation)
            }
            BoundTighteningType::ImplicitInvertedBasis => {
                self.examine_implicit_inverted_basis_matrix(tableau, bounds, until_saturation)
            }
        }
    }

    // ------------------------------------------------------------------
    // Constraint-matrix pass.
    // ------------------------------------------------------------------

    /// Tighten on rows of the original constraint matrix, repeating passes
    /// to saturation when requested.
    pub fn examine_constraint_matrix(
        &mut self,
        tableau: &dyn TableauView,
        bounds: &mut BoundManager,
        until_saturation: bool,
    ) -> Result<()> {
        self.ensure_dimensions(tableau);

        let mut remaining = if until_saturation { self.saturation_iterations } else { 1 };
        loop {
            let new_bounds = self.one_pass_over_constraint_matrix(tableau, bounds)?;
            if new_bounds > 0 {
                tracing::trace!(new_bounds, "constraint-matrix tightening pass");
                if let Some(stats) = &self.statistics {
                    stats.borrow_mut().num_tightenings_from_constraint_matrix += u64::from(new_bounds);
                }
            }
            remaining -= 1;
            if remaining == 0 || new_bounds == 0 {
                break;
            }
        }
        Ok(())
    }

    fn one_pass_over_constraint_matrix(
        &mut self,
        tableau: &dyn TableauView,
        bounds: &mut BoundManager,
    ) -> Result<u32> {
        let mut new_bounds = 0;
        for row_index in 0..tableau.m() {
            new_bounds += self.tighten_on_single_constraint_row(row_index, tableau, bounds)?;
        }
        Ok(new_bounds)
    }

    /// Derive bounds from one row `Σᵢ cᵢ·xᵢ = bᵣ` of the constraint matrix.
    ///
    /// The interval of `bᵣ − Σᵢ cᵢ·xᵢ` is accumulated once; each variable's
    /// own contribution is then backed out and the remainder divided by its
    /// coefficient.
    fn tighten_on_single_constraint_row(
        &mut self,
        row_index: usize,
        tableau: &dyn TableauView,
        bounds: &mut BoundManager,
    ) -> Result<u32> {
        let n = tableau.n();
        let sparse_row = tableau.sparse_row(row_index);
        let b = tableau.right_hand_side();

        for i in 0..n {
            self.ci_sign[i] = Sign::Zero;
            self.ci_times_lb[i] = 0.0;
            self.ci_times_ub[i] = 0.0;
        }
        for entry in sparse_row {
            let ci = entry.value;
            self.ci_sign[entry.index] =
                if float_utils::is_positive(ci) { Sign::Positive } else { Sign::Negative };
            self.ci_times_lb[entry.index] = ci * bounds.lower_bound(entry.index);
            self.ci_times_ub[entry.index] = ci * bounds.upper_bound(entry.index);
        }

        // Interval of bᵣ − Σᵢ cᵢ·xᵢ with every variable still included.
        let mut aux_lb = b[row_index];
        let mut aux_ub = b[row_index];
        for i in 0..n {
            if self.ci_sign[i] == Sign::Negative {
                aux_lb -= self.ci_times_lb[i];
                aux_ub -= self.ci_times_ub[i];
            } else {
                aux_lb -= self.ci_times_ub[i];
                aux_ub -= self.ci_times_lb[i];
            }
        }

        let mut result = 0;
        for entry in sparse_row {
            let index = entry.index;
            let ci = entry.value;
            if !float_utils::gt(ci.abs(), self.minimal_coefficient) {
                continue;
            }

            // Back out xᵢ's own contribution, then solve for it.
            let mut lower = aux_lb;
            let mut upper = aux_ub;
            if self.ci_sign[index] == Sign::Negative {
                lower += self.ci_times_lb[index];
                upper += self.ci_times_ub[index];
            } else {
                lower += self.ci_times_ub[index];
                upper += self.ci_times_lb[index];
            }

            lower /= ci;
            upper /= ci;
            if self.ci_sign[index] == Sign::Negative {
                std::mem::swap(&mut lower, &mut upper);
            }

            if bounds.tighten_from_constraint_row(index, lower, BoundKind::Lower, row_index, ci) {
                result += 1;
            }
            if bounds.tighten_from_constraint_row(index, upper, BoundKind::Upper, row_index, ci) {
                result += 1;
            }
            if float_utils::gt(bounds.lower_bound(index), bounds.upper_bound(index)) {
                return Err(Error::InfeasibleQuery);
            }
        }

        Ok(result)
    }

    // ------------------------------------------------------------------
    // Inverted-basis passes.
    // ------------------------------------------------------------------

    /// Assemble the inverted-basis rows from an explicitly computed basis
    /// inverse, then tighten on them.
    ///
    /// The inverse is a transient allocation owned by this call; it is
    /// released on every exit path, including an infeasibility return from
    /// the tightening rounds.
    pub fn examine_inverted_basis_matrix(
        &mut self,
        tableau: &dyn TableauView,
        bounds: &mut BoundManager,
        until_saturation: bool,
    ) -> Result<()> {
        self.ensure_dimensions(tableau);
        self.ensure_inverted_basis_buffers();

        let m = self.m;
        let width = self.n - self.m;
        let inverse = tableau.inverse_basis_matrix();
        let b = tableau.right_hand_side();

        for i in 0..m {
            let mut scalar = 0.0;
            for j in 0..m {
                scalar += inverse[i * m + j] * b[j];
            }
            self.rows[i].scalar = scalar;
            self.rows[i].lhs = tableau.basic_index_to_variable(i);

            for j in 0..width {
                let variable = tableau.non_basic_index_to_variable(j);
                let column = tableau.sparse_column(variable);
                let mut coefficient = 0.0;
                for entry in &column {
                    coefficient -= inverse[i * m + entry.index] * entry.value;
                }
                self.rows[i].entries[j] = RowEntry::new(variable, coefficient);
            }
        }

        self.saturate_inverted_basis_rows(bounds, until_saturation)
    }

    /// Assemble the inverted-basis rows column-by-column through the
    /// forward-transformation oracle, never materializing the inverse.
    pub fn examine_implicit_inverted_basis_matrix(
        &mut self,
        tableau: &dyn TableauView,
        bounds: &mut BoundManager,
        until_saturation: bool,
    ) -> Result<()> {
        self.ensure_dimensions(tableau);
        self.ensure_inverted_basis_buffers();

        let m = self.m;
        let width = self.n - self.m;

        // z = B⁻¹·b gives the scalars.
        tableau.forward_transformation(tableau.right_hand_side(), &mut self.z);
        for i in 0..m {
            self.rows[i].scalar = self.z[i];
            self.rows[i].lhs = tableau.basic_index_to_variable(i);
        }

        // One forward transformation per non-basic column fills the rows.
        for j in 0..width {
            let non_basic = tableau.non_basic_index_to_variable(j);
            let column = tableau.column(non_basic);
            tableau.forward_transformation(&column, &mut self.z);
            for i in 0..m {
                self.rows[i].entries[j] = RowEntry::new(non_basic, -self.z[i]);
            }
        }

        self.saturate_inverted_basis_rows(bounds, until_saturation)
    }

    fn saturate_inverted_basis_rows(
        &mut self,
        bounds: &mut BoundManager,
        until_saturation: bool,
    ) -> Result<()> {
        let mut remaining = if until_saturation { self.saturation_iterations } else { 1 };
        loop {
            let new_bounds = self.one_pass_over_inverted_basis_rows(bounds)?;
            if new_bounds > 0 {
                tracing::trace!(new_bounds, "inverted-basis tightening pass");
                if let Some(stats) = &self.statistics {
                    stats.borrow_mut().num_tightenings_from_explicit_basis += u64::from(new_bounds);
                }
            }
            remaining -= 1;
            if remaining == 0 || new_bounds == 0 {
                break;
            }
        }
        Ok(())
    }

    fn one_pass_over_inverted_basis_rows(&mut self, bounds: &mut BoundManager) -> Result<u32> {
        // The rows are moved aside for the duration of the pass and always
        // put back, so an infeasibility return leaves the buffers intact.
        let rows = std::mem::take(&mut self.rows);
        let mut new_bounds = 0;
        let mut failure = None;
        for row in &rows {
            match self.tighten_on_single_inverted_basis_row(row, bounds) {
                Ok(count) => new_bounds += count,
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }
        self.rows = rows;
        match failure {
            Some(error) => Err(error),
            None => Ok(new_bounds),
        }
    }

    /// Derive bounds from one inverted-basis row `y = Σᵢ cᵢ·xᵢ + β`: once
    /// for `y` by forward accumulation, then once for every `xᵢ` by
    /// rearranging.
    fn tighten_on_single_inverted_basis_row(
        &mut self,
        row: &TableauRow,
        bounds: &mut BoundManager,
    ) -> Result<u32> {
        let width = row.width();
        let mut result = 0;

        for i in 0..width {
            let ci = row.coefficient(i);
            if float_utils::is_zero(ci) {
                self.ci_sign[i] = Sign::Zero;
                self.ci_times_lb[i] = 0.0;
                self.ci_times_ub[i] = 0.0;
                continue;
            }
            self.ci_sign[i] =
                if float_utils::is_positive(ci) { Sign::Positive } else { Sign::Negative };
            let xi = row.variable(i);
            self.ci_times_lb[i] = ci * bounds.lower_bound(xi);
            self.ci_times_ub[i] = ci * bounds.upper_bound(xi);
        }

        // Pass for y.
        let y = row.lhs;
        let mut lower = row.scalar;
        let mut upper = row.scalar;
        for i in 0..width {
            if self.ci_sign[i] == Sign::Positive {
                lower += self.ci_times_lb[i];
                upper += self.ci_times_ub[i];
            } else {
                lower += self.ci_times_ub[i];
                upper += self.ci_times_lb[i];
            }
        }
        if bounds.tighten_from_basis_row(y, lower - self.rounding_constant, BoundKind::Lower) {
            result += 1;
        }
        if bounds.tighten_from_basis_row(y, upper + self.rounding_constant, BoundKind::Upper) {
            result += 1;
        }
        if float_utils::gt(bounds.lower_bound(y), bounds.upper_bound(y)) {
            return Err(Error::InfeasibleQuery);
        }

        // Pass for each xᵢ: the interval of y − Σᵢ cᵢ·xᵢ − β is accumulated
        // once with every variable included; each candidate's contribution
        // is backed out before dividing by its coefficient.
        let mut aux_lb = bounds.lower_bound(y) - row.scalar;
        let mut aux_ub = bounds.upper_bound(y) - row.scalar;
        for i in 0..width {
            if self.ci_sign[i] == Sign::Negative {
                aux_lb -= self.ci_times_lb[i];
                aux_ub -= self.ci_times_ub[i];
            } else {
                aux_lb -= self.ci_times_ub[i];
                aux_ub -= self.ci_times_lb[i];
            }
        }

        for i in 0..width {
            let ci = row.coefficient(i);
            if self.ci_sign[i] == Sign::Zero
                || !float_utils::gt(ci.abs(), self.minimal_coefficient)
            {
                continue;
            }

            let mut lower = aux_lb;
            let mut upper = aux_ub;
            if self.ci_sign[i] == Sign::Negative {
                lower += self.ci_times_lb[i];
                upper += self.ci_times_ub[i];
            } else {
                lower += self.ci_times_ub[i];
                upper += self.ci_times_lb[i];
            }

            lower /= ci;
            upper /= ci;
            if self.ci_sign[i] == Sign::Negative {
                std::mem::swap(&mut lower, &mut upper);
            }

            let xi = row.variable(i);
            if bounds.tighten_from_basis_row(xi, lower - self.rounding_constant, BoundKind::Lower) {
                result += 1;
            }
            if bounds.tighten_from_basis_row(xi, upper + self.rounding_constant, BoundKind::Upper) {
                result += 1;
            }
            if float_utils::gt(bounds.lower_bound(xi), bounds.upper_bound(xi)) {
                return Err(Error::InfeasibleQuery);
            }
        }

        Ok(result)
    }

    /// Tighten on just the row produced by the most recent pivot, bypassing
    /// the full pass. A missing pivot row is a no-op.
    pub fn examine_pivot_row(
        &mut self,
        tableau: &dyn TableauView,
        bounds: &mut BoundManager,
    ) -> Result<()> {
        self.ensure_dimensions(tableau);
        if let Some(stats) = &self.statistics {
            stats.borrow_mut().num_rows_examined_by_row_tightener += 1;
        }

        let Some(row) = tableau.pivot_row() else {
            return Ok(());
        };
        let new_bounds = self.tighten_on_single_inverted_basis_row(row, bounds)?;
        if new_bounds > 0
            && let Some(stats) = &self.statistics
        {
            stats.borrow_mut().num_tightenings_from_rows += u64::from(new_bounds);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tableau::DenseTableau;
    use veridex_context::Context;

    fn config_with(tightening_type: BoundTighteningType) -> Config {
        Config { bound_tightening_type: tightening_type, ..Config::default() }
    }

    fn unit_box_bounds(ctx: &Context, n: usize) -> BoundManager {
        let mut bounds = BoundManager::new(ctx);
        bounds.initialize(n);
        for v in 0..n {
            bounds.set_lower_bound(v, 0.0);
            bounds.set_upper_bound(v, 1.0);
        }
        bounds
    }

    /// x + y + z = rhs over a single row, no basis structure needed.
    fn sum_row_tableau(rhs: f64) -> DenseTableau {
        DenseTableau::new(1, 3, vec![1.0, 1.0, 1.0], vec![rhs], vec![0])
    }

    #[test]
    fn test_sum_two_changes_nothing() {
        let ctx = Context::new();
        let mut bounds = unit_box_bounds(&ctx, 3);
        let tableau = sum_row_tableau(2.0);
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ConstraintMatrix));
        tightener.set_dimensions(&tableau);

        tightener.examine_constraint_matrix(&tableau, &mut bounds, true).unwrap();
        for v in 0..3 {
            assert_eq!(bounds.lower_bound(v), 0.0);
            assert_eq!(bounds.upper_bound(v), 1.0);
        }
    }

    #[test]
    fn test_sum_three_pins_all_variables() {
        let ctx = Context::new();
        let mut bounds = unit_box_bounds(&ctx, 3);
        let tableau = sum_row_tableau(3.0);
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ConstraintMatrix));
        tightener.set_dimensions(&tableau);

        tightener.examine_constraint_matrix(&tableau, &mut bounds, true).unwrap();
        for v in 0..3 {
            assert_eq!(bounds.lower_bound(v), 1.0);
            assert_eq!(bounds.upper_bound(v), 1.0);
        }
    }

    #[test]
    fn test_sum_three_and_a_half_is_infeasible() {
        let ctx = Context::new();
        let mut bounds = unit_box_bounds(&ctx, 3);
        let tableau = sum_row_tableau(3.5);
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ConstraintMatrix));
        tightener.set_dimensions(&tableau);

        let result = tightener.examine_constraint_matrix(&tableau, &mut bounds, true);
        assert_eq!(result, Err(Error::InfeasibleQuery));
        assert!(!bounds.consistent_bounds());
    }

    #[test]
    fn test_all_coefficients_below_threshold_yield_nothing() {
        let ctx = Context::new();
        let mut bounds = unit_box_bounds(&ctx, 2);
        // Both coefficients below the 0.01 default threshold; the row would
        // otherwise pin both variables hard.
        let tableau = DenseTableau::new(1, 2, vec![0.005, 0.005], vec![100.0], vec![0]);
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ConstraintMatrix));
        tightener.set_dimensions(&tableau);

        tightener.examine_constraint_matrix(&tableau, &mut bounds, true).unwrap();
        for v in 0..2 {
            assert_eq!(bounds.lower_bound(v), 0.0);
            assert_eq!(bounds.upper_bound(v), 1.0);
        }
    }

    #[test]
    fn test_coefficient_exactly_at_threshold_is_skipped() {
        let ctx = Context::new();
        let mut bounds = unit_box_bounds(&ctx, 2);
        let minimal = Config::default().minimal_coefficient_for_tightening;
        // x0 sits exactly at the threshold; x1 is safely above it.
        let tableau = DenseTableau::new(1, 2, vec![minimal, 1.0], vec![-5.0], vec![1]);
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ConstraintMatrix));
        tightener.set_dimensions(&tableau);

        let result = tightener.examine_constraint_matrix(&tableau, &mut bounds, true);
        // x1 = −5 − minimal·x0 crosses below zero: infeasible through x1,
        // while x0 itself is never tightened.
        assert_eq!(result, Err(Error::InfeasibleQuery));
        assert_eq!(bounds.lower_bound(0), 0.0);
        assert_eq!(bounds.upper_bound(0), 1.0);
    }

    #[test]
    fn test_unbounded_variable_contributes_no_finite_bound() {
        let ctx = Context::new();
        let mut bounds = BoundManager::new(&ctx);
        bounds.initialize(2);
        // x1 ∈ [0, 1]; x0 unbounded on both sides. Row: x0 + x1 = 1.
        bounds.set_lower_bound(1, 0.0);
        bounds.set_upper_bound(1, 1.0);
        let tableau = DenseTableau::new(1, 2, vec![1.0, 1.0], vec![1.0], vec![0]);
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ConstraintMatrix));
        tightener.set_dimensions(&tableau);

        tightener.examine_constraint_matrix(&tableau, &mut bounds, true).unwrap();
        // Both accumulated ends of the row are infinite, so every derived
        // bound is ±∞ and nothing is registered on either variable.
        assert_eq!(bounds.lower_bound(0), float_utils::negative_infinity());
        assert_eq!(bounds.upper_bound(0), float_utils::infinity());
        assert_eq!(bounds.lower_bound(1), 0.0);
        assert_eq!(bounds.upper_bound(1), 1.0);
    }

    #[test]
    fn test_one_sided_bound_still_propagates() {
        let ctx = Context::new();
        let mut bounds = BoundManager::new(&ctx);
        bounds.initialize(2);
        // x0 ≤ 5, lower side open; x1 ∈ [0, 1]. Row: x0 + x1 = 1.
        bounds.set_upper_bound(0, 5.0);
        bounds.set_lower_bound(1, 0.0);
        bounds.set_upper_bound(1, 1.0);
        let tableau = DenseTableau::new(1, 2, vec![1.0, 1.0], vec![1.0], vec![0]);
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ConstraintMatrix));
        tightener.set_dimensions(&tableau);

        tightener.examine_constraint_matrix(&tableau, &mut bounds, true).unwrap();
        // x0 = 1 − x1 ∈ [0, 1]: the finite side tightens, and x1's lower
        // side (which depends on x0's open end) stays put.
        assert_eq!(bounds.lower_bound(0), 0.0);
        assert_eq!(bounds.upper_bound(0), 1.0);
        assert_eq!(bounds.lower_bound(1), 0.0);
        assert_eq!(bounds.upper_bound(1), 1.0);
    }

    #[test]
    fn test_updates_visible_within_one_pass() {
        let ctx = Context::new();
        let mut bounds = BoundManager::new(&ctx);
        bounds.initialize(3);
        for v in 0..3 {
            bounds.set_lower_bound(v, -100.0);
            bounds.set_upper_bound(v, 100.0);
        }
        bounds.set_upper_bound(0, 0.0);

        // Rows ordered along the chain: x1 = x0, then x2 = x1. A single
        // pass must propagate the whole chain.
        let tableau = DenseTableau::new(
            2,
            3,
            vec![1.0, -1.0, 0.0, 0.0, 1.0, -1.0],
            vec![0.0, 0.0],
            vec![0, 1],
        );
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ConstraintMatrix));
        tightener.set_dimensions(&tableau);

        tightener.examine_constraint_matrix(&tableau, &mut bounds, false).unwrap();
        assert_eq!(bounds.upper_bound(1), 0.0);
        assert_eq!(bounds.upper_bound(2), 0.0);
    }

    fn anti_chain_tableau() -> DenseTableau {
        // Rows ordered against the chain: row 0 is x3 = x2, row 1 is
        // x2 = x1, row 2 is x1 = x0. Each pass advances one link only.
        DenseTableau::new(
            3,
            4,
            vec![
                0.0, 0.0, 1.0, -1.0, //
                0.0, 1.0, -1.0, 0.0, //
                1.0, -1.0, 0.0, 0.0,
            ],
            vec![0.0, 0.0, 0.0],
            vec![0, 1, 2],
        )
    }

    fn anti_chain_bounds(ctx: &Context) -> BoundManager {
        let mut bounds = BoundManager::new(ctx);
        bounds.initialize(4);
        for v in 0..4 {
            bounds.set_lower_bound(v, -100.0);
            bounds.set_upper_bound(v, 100.0);
        }
        bounds.set_upper_bound(0, 0.0);
        bounds
    }

    #[test]
    fn test_saturation_cap_limits_rounds() {
        let ctx = Context::new();
        let mut bounds = anti_chain_bounds(&ctx);
        let config = Config {
            bound_tightening_type: BoundTighteningType::ConstraintMatrix,
            row_bound_tightener_saturation_iterations: 3,
            ..Config::default()
        };
        let tableau = anti_chain_tableau();
        let mut tightener = RowBoundTightener::new(&config);
        tightener.set_dimensions(&tableau);

        tightener.examine_constraint_matrix(&tableau, &mut bounds, true).unwrap();
        // Three rounds reach the end of the chain.
        assert_eq!(bounds.upper_bound(1), 0.0);
        assert_eq!(bounds.upper_bound(2), 0.0);
        assert_eq!(bounds.upper_bound(3), 0.0);

        // Two rounds must stop one link short, productive or not.
        let ctx = Context::new();
        let mut bounds = anti_chain_bounds(&ctx);
        let config = Config { row_bound_tightener_saturation_iterations: 2, ..config };
        let mut tightener = RowBoundTightener::new(&config);
        tightener.set_dimensions(&tableau);
        tightener.examine_constraint_matrix(&tableau, &mut bounds, true).unwrap();
        assert_eq!(bounds.upper_bound(2), 0.0);
        assert_eq!(bounds.upper_bound(3), 100.0);
    }

    #[test]
    fn test_second_examination_learns_nothing() {
        let ctx = Context::new();
        let mut bounds = unit_box_bounds(&ctx, 3);
        let tableau = sum_row_tableau(3.0);
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ConstraintMatrix));
        tightener.set_dimensions(&tableau);
        let stats = Rc::new(RefCell::new(Statistics::new()));
        tightener.set_statistics(Rc::clone(&stats));

        tightener.examine_constraint_matrix(&tableau, &mut bounds, true).unwrap();
        let after_first = stats.borrow().num_tightenings_from_constraint_matrix;
        assert!(after_first > 0);

        tightener.examine_constraint_matrix(&tableau, &mut bounds, true).unwrap();
        assert_eq!(stats.borrow().num_tightenings_from_constraint_matrix, after_first);
    }

    /// x2 and x3 are slacks of x0 + x1 = 2 and x0 − x1 = 0, basic; with
    /// x2 = x3 = 0 fixed and x0, x1 ∈ [0, 1], the basis rows pin
    /// x0 = x1 = 1 up to the rounding constant.
    fn slack_lp() -> DenseTableau {
        DenseTableau::new(
            2,
            4,
            vec![1.0, 1.0, 1.0, 0.0, 1.0, -1.0, 0.0, 1.0],
            vec![2.0, 0.0],
            vec![2, 3],
        )
    }

    fn slack_lp_bounds(ctx: &Context) -> BoundManager {
        let mut bounds = BoundManager::new(ctx);
        bounds.initialize(4);
        for v in 0..2 {
            bounds.set_lower_bound(v, 0.0);
            bounds.set_upper_bound(v, 1.0);
        }
        for v in 2..4 {
            bounds.set_lower_bound(v, 0.0);
            bounds.set_upper_bound(v, 0.0);
        }
        bounds
    }

    #[test]
    fn test_explicit_inverted_basis_tightens_basics() {
        let ctx = Context::new();
        let mut bounds = slack_lp_bounds(&ctx);
        let tableau = slack_lp();
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ComputeInvertedBasis));
        tightener.set_dimensions(&tableau);

        tightener.examine_inverted_basis_matrix(&tableau, &mut bounds, true).unwrap();
        let rounding = Config::default().bound_tightening_rounding_constant;
        // The row x2 = 2 − x0 − x1 with x2 pinned to zero forces each of
        // x0, x1 up to 1 (less the registration slack).
        for v in 0..2 {
            assert!((bounds.lower_bound(v) - 1.0).abs() <= 2.0 * rounding + 1e-9);
            assert_eq!(bounds.upper_bound(v), 1.0);
        }
    }

    #[test]
    fn test_explicit_and_implicit_modes_agree() {
        let rounding = Config::default().bound_tightening_rounding_constant;

        let ctx = Context::new();
        let mut explicit_bounds = slack_lp_bounds(&ctx);
        let tableau = slack_lp();
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ComputeInvertedBasis));
        tightener.set_dimensions(&tableau);
        tightener.examine_inverted_basis_matrix(&tableau, &mut explicit_bounds, true).unwrap();

        let ctx = Context::new();
        let mut implicit_bounds = slack_lp_bounds(&ctx);
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ImplicitInvertedBasis));
        tightener.set_dimensions(&tableau);
        tightener
            .examine_implicit_inverted_basis_matrix(&tableau, &mut implicit_bounds, true)
            .unwrap();

        for v in 0..4 {
            let delta_lb = (explicit_bounds.lower_bound(v) - implicit_bounds.lower_bound(v)).abs();
            let delta_ub = (explicit_bounds.upper_bound(v) - implicit_bounds.upper_bound(v)).abs();
            assert!(delta_lb <= 2.0 * rounding + 1e-9, "lb mismatch on x{v}: {delta_lb}");
            assert!(delta_ub <= 2.0 * rounding + 1e-9, "ub mismatch on x{v}: {delta_ub}");
        }
    }

    #[test]
    fn test_pivot_row_shortcut() {
        let ctx = Context::new();
        let mut bounds = BoundManager::new(&ctx);
        bounds.initialize(4);
        for v in 0..4 {
            bounds.set_lower_bound(v, 0.0);
            bounds.set_upper_bound(v, 1.0);
        }

        // Pivot row: x3 = x0 + x1 + 1, so lb(x3) ≥ 1 forces x3 = 1 and the
        // rearranged row forces x0 = x1 = 0.
        let mut tableau = slack_lp();
        let mut row = TableauRow::new(2);
        row.lhs = 3;
        row.scalar = 1.0;
        row.entries[0] = RowEntry::new(0, 1.0);
        row.entries[1] = RowEntry::new(1, 1.0);
        tableau.set_pivot_row(row);

        let stats = Rc::new(RefCell::new(Statistics::new()));
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ComputeInvertedBasis));
        tightener.set_dimensions(&tableau);
        tightener.set_statistics(Rc::clone(&stats));

        tightener.examine_pivot_row(&tableau, &mut bounds).unwrap();
        assert_eq!(stats.borrow().num_rows_examined_by_row_tightener, 1);
        assert!(stats.borrow().num_tightenings_from_rows > 0);
        let rounding = Config::default().bound_tightening_rounding_constant;
        assert!((bounds.lower_bound(3) - 1.0).abs() <= rounding + 1e-9);
    }

    #[test]
    fn test_buffers_survive_infeasible_pass() {
        let ctx = Context::new();
        let mut bounds = unit_box_bounds(&ctx, 3);
        let tableau = sum_row_tableau(3.5);
        let mut tightener = RowBoundTightener::new(&config_with(BoundTighteningType::ImplicitInvertedBasis));
        tightener.set_dimensions(&tableau);

        // The basis row x0 = 3.5 − x1 − x2 forces lb(x0) ≥ 1.5 > 1.
        let result = tightener.examine_implicit_inverted_basis_matrix(&tableau, &mut bounds, true);
        assert_eq!(result, Err(Error::InfeasibleQuery));
        // The row buffers were put back despite the unwinding.
        assert_eq!(tightener.rows.len(), 1);
        assert_eq!(tightener.rows[0].width(), 2);
    }
}
