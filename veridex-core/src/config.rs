//! Search-core configuration.
//!
//! All knobs are read once at construction time and passed down explicitly;
//! nothing in the core consults global state. The defaults reproduce the
//! behavior the rest of the test suite is written against.

use serde::{Deserialize, Serialize};

/// How the tightener obtains rows of the inverted basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundTighteningType {
    /// Work on rows of the original constraint matrix only.
    ConstraintMatrix,
    /// Compute the basis inverse explicitly and assemble rows from it.
    ComputeInvertedBasis,
    /// Assemble rows column-by-column through forward transformations,
    /// never materializing the inverse.
    ImplicitInvertedBasis,
}

/// How the decision stack picks the next constraint to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchingStrategy {
    /// Branch on constraints by violation history (the default heuristic).
    ReluViolation,
    /// Branch on the constraint with the highest pseudo-impact score.
    PseudoImpact,
}

/// Configuration for the search-and-deduction core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Row source for inverted-basis bound tightening.
    pub bound_tightening_type: BoundTighteningType,

    /// Cap on tightening rounds when iterating to saturation.
    pub row_bound_tightener_saturation_iterations: u32,

    /// Slack subtracted from derived lower bounds and added to derived upper
    /// bounds in the inverted-basis passes, so floating-point noise cannot
    /// make two consecutive rounds oscillate.
    pub bound_tightening_rounding_constant: f64,

    /// Entries with |coefficient| at or below this value are not used to
    /// derive bounds; dividing by them amplifies error past usefulness.
    pub minimal_coefficient_for_tightening: f64,

    /// Drive the search with the sum-of-infeasibilities local-search
    /// procedure, scoring constraints with a pseudo-impact tracker.
    pub use_soi_local_search: bool,

    /// Prefer the violated constraint with the fewest historical fixes.
    pub use_least_fix: bool,

    /// Number of violations after which a constraint becomes a split
    /// candidate.
    pub constraint_violation_threshold: u32,

    /// Number of rejected phase-pattern proposals after which the local
    /// search gives up and the core branches.
    pub phase_pattern_rejection_threshold: u32,

    /// Branching heuristic consulted when picking a split candidate.
    pub branching_strategy: BranchingStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bound_tightening_type: BoundTighteningType::ComputeInvertedBasis,
            row_bound_tightener_saturation_iterations: 20,
            bound_tightening_rounding_constant: 1e-7,
            minimal_coefficient_for_tightening: 0.01,
            use_soi_local_search: false,
            use_least_fix: false,
            constraint_violation_threshold: 20,
            phase_pattern_rejection_threshold: 5,
            branching_strategy: BranchingStrategy::ReluViolation,
        }
    }
}
