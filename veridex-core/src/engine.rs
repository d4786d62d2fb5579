//! The engine façade the decision stack drives.
//!
//! The search engine proper (simplex pivoting, violation detection, the
//! outer solve loop) lives outside this crate. The decision stack only
//! needs the narrow contract collected in [`Engine`]: apply a case split,
//! snapshot and restore state, answer consistency queries, and navigate the
//! proof tree when proofs are on.

use crate::certificate::{CertificateTree, NodeId};
use crate::config::BranchingStrategy;
use crate::constraint::{CaseSplit, PlConstraintRef};
use crate::error::Result;

/// How much engine state a snapshot captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableauStateStorageLevel {
    /// Bounds only; enough for ordinary backtracking, where the tableau is
    /// repaired incrementally.
    BoundsOnly,
    /// The full tableau; required when a decision path will be replayed
    /// from scratch.
    EntireTableau,
}

/// A captured tableau basis and assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableauSnapshot {
    /// Basic variables in basis order.
    pub basic_variables: Vec<usize>,
    /// Non-basic variables in slot order.
    pub non_basic_variables: Vec<usize>,
    /// Current variable assignment.
    pub assignment: Vec<f64>,
}

/// A captured engine state, owned by the decision frame that took it.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    /// Monotone identifier assigned by the decision stack.
    pub state_id: u64,
    /// Lower bounds at capture time.
    pub lower_bounds: Vec<f64>,
    /// Upper bounds at capture time.
    pub upper_bounds: Vec<f64>,
    /// Present only at [`TableauStateStorageLevel::EntireTableau`].
    pub tableau: Option<TableauSnapshot>,
}

/// Operations the decision stack requires from the engine.
pub trait Engine {
    /// Tighten bounds according to `split`'s tightenings.
    fn apply_split(&mut self, split: &CaseSplit);

    /// Capture the current engine state at the requested storage level.
    fn store_state(&mut self, level: TableauStateStorageLevel) -> EngineState;

    /// Restore a previously captured state.
    fn restore_state(&mut self, state: &EngineState) -> Result<()>;

    /// True while no variable's bounds cross.
    fn consistent_bounds(&self) -> bool;

    /// Called immediately before the decision stack pushes a context level.
    fn pre_context_push_hook(&mut self) {}

    /// Called immediately after the decision stack pops a context level.
    fn post_context_pop_hook(&mut self) {}

    /// Pick the constraint to branch on, per the configured heuristic.
    /// `None` defers to the decision stack's own fallback.
    fn pick_split_pl_constraint(&mut self, strategy: BranchingStrategy) -> Option<PlConstraintRef>;

    /// Flush every pending bound tightening into the tableau.
    fn apply_all_bound_tightenings(&mut self) -> Result<()>;

    /// Apply the case splits of every constraint whose phase became fixed.
    fn apply_all_valid_constraint_case_splits(&mut self) -> Result<()>;

    /// True when a refutation proof is being produced.
    fn should_produce_proofs(&self) -> bool {
        false
    }

    /// Derive an explanation for the simplex failure that is about to be
    /// backtracked over; proof mode only.
    fn explain_simplex_failure(&mut self) {}

    /// Read access to the proof tree, when proofs are on.
    fn certificate_tree(&self) -> Option<&CertificateTree> {
        None
    }

    /// Write access to the proof tree, when proofs are on.
    fn certificate_tree_mut(&mut self) -> Option<&mut CertificateTree> {
        None
    }

    /// The proof-tree node the search currently sits in.
    fn certificate_current(&self) -> Option<NodeId> {
        None
    }

    /// Move the proof-tree pointer.
    fn set_certificate_current(&mut self, node: NodeId) {
        let _ = node;
    }

    /// True when case splits are injected by an outside orchestrator rather
    /// than decided on the local stack. In that submode the decision-stack
    /// depth is allowed to diverge from the context level.
    fn external_split_mode(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_state_defaults() {
        let state = EngineState::default();
        assert_eq!(state.state_id, 0);
        assert!(state.tableau.is_none());
        assert!(state.lower_bounds.is_empty());
    }

    #[test]
    fn test_storage_levels_differ() {
        assert_ne!(TableauStateStorageLevel::BoundsOnly, TableauStateStorageLevel::EntireTableau);
    }
}
