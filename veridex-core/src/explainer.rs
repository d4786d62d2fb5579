//! Per-bound explanation vectors for proof production.
//!
//! When proofs are enabled, every bound carries an optional sparse vector of
//! length `m` (one slot per constraint row): the linear combination of rows
//! that certifies the bound from the initial bounds. A bound with no vector
//! is *trivial* — it is one of the initial bounds and needs no certificate.
//!
//! Explanations are context-versioned jointly with the bounds they certify:
//! popping a decision level reverts both together.

use veridex_context::{Cdo, Context};

use crate::sparse::SparseRow;
use crate::tightening::BoundKind;

/// Explanation storage for all `(variable, kind)` pairs.
pub struct BoundExplainer {
    number_of_variables: usize,
    number_of_rows: usize,
    lower: Vec<Cdo<Option<SparseRow>>>,
    upper: Vec<Cdo<Option<SparseRow>>>,
}

impl BoundExplainer {
    /// Allocate trivial explanations for `number_of_variables` variables
    /// over `number_of_rows` constraint rows.
    pub fn new(number_of_variables: usize, number_of_rows: usize, ctx: &Context) -> Self {
        Self {
            number_of_variables,
            number_of_rows,
            lower: (0..number_of_variables).map(|_| Cdo::new(ctx, None)).collect(),
            upper: (0..number_of_variables).map(|_| Cdo::new(ctx, None)).collect(),
        }
    }

    /// Number of variables covered.
    pub fn number_of_variables(&self) -> usize {
        self.number_of_variables
    }

    /// Length of every explanation vector.
    pub fn number_of_rows(&self) -> usize {
        self.number_of_rows
    }

    /// Add a slot for a newly registered variable.
    pub fn register_new_variable(&mut self, ctx: &Context) {
        self.number_of_variables += 1;
        self.lower.push(Cdo::new(ctx, None));
        self.upper.push(Cdo::new(ctx, None));
    }

    fn slot(&self, variable: usize, kind: BoundKind) -> &Cdo<Option<SparseRow>> {
        match kind {
            BoundKind::Lower => &self.lower[variable],
            BoundKind::Upper => &self.upper[variable],
        }
    }

    /// True when the bound has no certifying combination attached.
    pub fn is_trivial(&self, variable: usize, kind: BoundKind) -> bool {
        self.slot(variable, kind).get().is_none()
    }

    /// The explanation vector, if one was set.
    pub fn explanation(&self, variable: usize, kind: BoundKind) -> Option<SparseRow> {
        self.slot(variable, kind).get()
    }

    /// Attach a certifying combination to a bound.
    pub fn set_explanation(&self, explanation: SparseRow, variable: usize, kind: BoundKind) {
        debug_assert!(explanation.iter().all(|entry| entry.index < self.number_of_rows));
        self.slot(variable, kind).set(Some(explanation));
    }

    /// Drop the explanation, making the bound trivial again.
    pub fn reset_explanation(&self, variable: usize, kind: BoundKind) {
        self.slot(variable, kind).set(None);
    }

    /// Overwrite every explanation with the corresponding one of `other`.
    pub fn copy_content_from(&self, other: &BoundExplainer) {
        debug_assert_eq!(self.number_of_variables, other.number_of_variables);
        for variable in 0..self.number_of_variables {
            for kind in [BoundKind::Lower, BoundKind::Upper] {
                self.slot(variable, kind).set(other.explanation(variable, kind));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_trivial() {
        let ctx = Context::new();
        let explainer = BoundExplainer::new(3, 2, &ctx);
        for v in 0..3 {
            assert!(explainer.is_trivial(v, BoundKind::Lower));
            assert!(explainer.is_trivial(v, BoundKind::Upper));
        }
    }

    #[test]
    fn test_set_get_reset() {
        let ctx = Context::new();
        let explainer = BoundExplainer::new(2, 3, &ctx);

        let expl = SparseRow::from_dense(&[1.0, 1.0, 1.0]);
        explainer.set_explanation(expl.clone(), 0, BoundKind::Upper);
        assert!(!explainer.is_trivial(0, BoundKind::Upper));
        assert!(explainer.is_trivial(0, BoundKind::Lower));

        let back = explainer.explanation(0, BoundKind::Upper).unwrap();
        assert_eq!(back.to_dense(3), expl.to_dense(3));

        explainer.reset_explanation(0, BoundKind::Upper);
        assert!(explainer.is_trivial(0, BoundKind::Upper));
    }

    #[test]
    fn test_reverts_with_context() {
        let ctx = Context::new();
        let explainer = BoundExplainer::new(1, 2, &ctx);

        ctx.push();
        explainer.set_explanation(SparseRow::from_dense(&[0.5, 0.0]), 0, BoundKind::Lower);
        assert!(!explainer.is_trivial(0, BoundKind::Lower));
        ctx.pop();
        assert!(explainer.is_trivial(0, BoundKind::Lower));
    }

    #[test]
    fn test_copy_content() {
        let ctx = Context::new();
        let a = BoundExplainer::new(2, 2, &ctx);
        let b = BoundExplainer::new(2, 2, &ctx);
        a.set_explanation(SparseRow::from_dense(&[1.0, 2.0]), 1, BoundKind::Lower);

        b.copy_content_from(&a);
        assert!(!b.is_trivial(1, BoundKind::Lower));
        assert!(b.is_trivial(0, BoundKind::Lower));
    }
}
