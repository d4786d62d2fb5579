//! Shared fixtures for the integration tests: an engine built from the real
//! bound manager, tableau and tightener, wired the way the verifier's outer
//! loop wires them.

use std::cell::RefCell;
use std::rc::Rc;

use veridex_core::{
    BoundManager, BoundTighteningType, BranchingStrategy, CaseSplit, Config, Context, DenseTableau,
    Engine, EngineState, PlConstraintRef, ReluConstraint, Result, RowBoundTightener,
    TableauStateStorageLevel,
};

/// An engine over a fixed tableau: applying a split tightens bounds and
/// immediately propagates them through the constraint matrix.
pub struct SearchHarness {
    pub bounds: BoundManager,
    pub tableau: DenseTableau,
    pub tightener: RowBoundTightener,
    pub pick: Option<PlConstraintRef>,
}

impl SearchHarness {
    pub fn new(ctx: &Context, tableau: DenseTableau, variables: usize) -> Self {
        let mut bounds = BoundManager::new(ctx);
        bounds.initialize(variables);
        let config = Config {
            bound_tightening_type: BoundTighteningType::ConstraintMatrix,
            ..Config::default()
        };
        let mut tightener = RowBoundTightener::new(&config);
        tightener.set_dimensions(&tableau);
        Self { bounds, tableau, tightener, pick: None }
    }

    /// Propagate current bounds through every row until saturation.
    /// Infeasibility shows up as inconsistent bounds, not as an error.
    pub fn propagate(&mut self) {
        let _ = self.tightener.examine(&self.tableau, &mut self.bounds, true);
    }

    /// A context-registered rectifier `f = max(0, b)` as a shared handle.
    pub fn relu(ctx: &Context, id: usize, b: usize, f: usize, aux: usize) -> PlConstraintRef {
        let mut relu = ReluConstraint::new(id, b, f, aux);
        relu.initialize_context_dependent_state(ctx);
        Rc::new(RefCell::new(relu))
    }
}

impl Engine for SearchHarness {
    fn apply_split(&mut self, split: &CaseSplit) {
        for tightening in split.bound_tightenings() {
            match tightening.kind {
                veridex_core::BoundKind::Lower => {
                    self.bounds.set_lower_bound(tightening.variable, tightening.value);
                }
                veridex_core::BoundKind::Upper => {
                    self.bounds.set_upper_bound(tightening.variable, tightening.value);
                }
            }
        }
        if self.bounds.consistent_bounds() {
            self.propagate();
        }
    }

    fn store_state(&mut self, level: TableauStateStorageLevel) -> EngineState {
        EngineState {
            state_id: 0,
            lower_bounds: self.bounds.lower_bounds().to_vec(),
            upper_bounds: self.bounds.upper_bounds().to_vec(),
            tableau: match level {
                TableauStateStorageLevel::BoundsOnly => None,
                TableauStateStorageLevel::EntireTableau => Some(Default::default()),
            },
        }
    }

    fn restore_state(&mut self, state: &EngineState) -> Result<()> {
        // Bounds revert through the context; the snapshot must agree.
        assert_eq!(state.lower_bounds, self.bounds.lower_bounds());
        assert_eq!(state.upper_bounds, self.bounds.upper_bounds());
        Ok(())
    }

    fn consistent_bounds(&self) -> bool {
        self.bounds.consistent_bounds()
    }

    fn pre_context_push_hook(&mut self) {
        self.bounds.store_local_bounds();
    }

    fn post_context_pop_hook(&mut self) {
        self.bounds.restore_local_bounds();
    }

    fn pick_split_pl_constraint(&mut self, _strategy: BranchingStrategy) -> Option<PlConstraintRef> {
        self.pick.clone()
    }

    fn apply_all_bound_tightenings(&mut self) -> Result<()> {
        self.propagate();
        Ok(())
    }

    fn apply_all_valid_constraint_case_splits(&mut self) -> Result<()> {
        Ok(())
    }
}
