//! The decision stack driving the case-split search.
//!
//! The core owns a stack of decision frames, one per case split performed.
//! Each frame holds the engine snapshot taken just before the split, the
//! case currently being explored, the cases not yet tried, and any splits
//! proved unconditionally valid under the active case.
//!
//! Violation reports accumulate per constraint; once a constraint crosses
//! the configured threshold the core marks itself as needing a split and
//! picks a candidate — through the engine's branching heuristic when it
//! offers one, by violation history otherwise. [`SmtCore::perform_split`]
//! then deactivates the candidate, snapshots the engine, pushes a context
//! level and applies the first case. On infeasibility the driver calls
//! [`SmtCore::pop_split`], which unwinds exhausted frames and advances the
//! next one to its following case; an empty stack means the whole query is
//! unsatisfiable.
//!
//! Every context push performed here is paired with exactly one frame
//! creation, and every pop with a frame advancement or removal, so the
//! stack depth always equals the context level (outside the external-split
//! submode used for replay).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use rustc_hash::FxHashMap;

use veridex_context::Context;

use crate::config::{BranchingStrategy, Config};
use crate::constraint::{CaseSplit, PlConstraintRef};
use crate::engine::{Engine, EngineState, TableauStateStorageLevel};
use crate::error::{Error, Result};
use crate::float_utils;
use crate::score_tracker::PseudoImpactTracker;
use crate::statistics::Statistics;
use crate::tightening::BoundKind;

/// One decision frame.
#[derive(Debug)]
pub struct SmtStackEntry {
    /// The case currently applied at this level.
    pub active_split: CaseSplit,
    /// Cases not yet explored, in decreasing preference order.
    pub alternative_splits: VecDeque<CaseSplit>,
    /// Splits proved unconditionally valid under the active case; cleared
    /// whenever the frame advances to another case.
    pub implied_valid_splits: Vec<CaseSplit>,
    /// Engine snapshot taken just before the split was applied.
    pub engine_state: EngineState,
}

/// A serialized decision path, for handing a search prefix to another core
/// instance.
#[derive(Debug, Clone, Default)]
pub struct SmtState {
    /// Splits implied before any decision was made.
    pub implied_valid_splits_at_root: Vec<CaseSplit>,
    /// The decision path, oldest frame first.
    pub stack: Vec<SmtReplayEntry>,
    /// Snapshot-id counter at serialization time.
    pub state_id: u64,
}

/// A frame of a serialized decision path, without its engine snapshot
/// (replay re-captures one).
#[derive(Debug, Clone)]
pub struct SmtReplayEntry {
    /// The case applied at this level.
    pub active_split: CaseSplit,
    /// Cases not yet explored.
    pub alternative_splits: VecDeque<CaseSplit>,
    /// Splits implied under the active case.
    pub implied_valid_splits: Vec<CaseSplit>,
}

/// The decision stack.
pub struct SmtCore {
    context: Context,

    stack: Vec<SmtStackEntry>,
    implied_valid_splits_at_root: Vec<CaseSplit>,

    need_to_split: bool,
    constraint_for_splitting: Option<PlConstraintRef>,
    state_id: u64,

    constraint_violation_counts: FxHashMap<usize, u32>,
    constraint_violation_threshold: u32,
    phase_pattern_rejection_threshold: u32,
    num_rejected_phase_pattern_proposals: u32,
    branching_strategy: BranchingStrategy,
    use_least_fix: bool,
    use_soi_local_search: bool,

    score_tracker: Option<PseudoImpactTracker>,
    debugging_solution: FxHashMap<usize, f64>,
    statistics: Option<Rc<RefCell<Statistics>>>,
}

impl SmtCore {
    /// A core at decision level 0, configured from `config`, sharing
    /// `context` with the bound manager.
    pub fn new(context: &Context, config: &Config) -> Self {
        Self {
            context: context.clone(),
            stack: Vec::new(),
            implied_valid_splits_at_root: Vec::new(),
            need_to_split: false,
            constraint_for_splitting: None,
            state_id: 0,
            constraint_violation_counts: FxHashMap::default(),
            constraint_violation_threshold: config.constraint_violation_threshold,
            phase_pattern_rejection_threshold: config.phase_pattern_rejection_threshold,
            num_rejected_phase_pattern_proposals: 0,
            branching_strategy: config.branching_strategy,
            use_least_fix: config.use_least_fix,
            use_soi_local_search: config.use_soi_local_search,
            score_tracker: None,
            debugging_solution: FxHashMap::default(),
            statistics: None,
        }
    }

    /// Inject the statistics sink.
    pub fn set_statistics(&mut self, statistics: Rc<RefCell<Statistics>>) {
        self.statistics = Some(statistics);
    }

    /// Set up pseudo-impact scoring over the constraint pool when the
    /// local-search mode is on.
    pub fn initialize_score_tracker_if_needed(&mut self, constraints: &[PlConstraintRef]) {
        if self.use_soi_local_search {
            let mut tracker = PseudoImpactTracker::new();
            tracker.initialize(constraints);
            self.score_tracker = Some(tracker);
            tracing::debug!("tracking pseudo impact");
        }
    }

    /// Fold a score observation into the pseudo-impact tracker.
    pub fn update_pseudo_impact(&mut self, constraint_id: usize, observation: f64) {
        if let Some(tracker) = &mut self.score_tracker {
            tracker.update_score(constraint_id, observation);
        }
    }

    /// Record one violation of `constraint`. At the violation threshold the
    /// core marks itself as needing a split, preferring the heuristic's
    /// candidate and falling back to the reported constraint.
    pub fn report_violated_constraint(
        &mut self,
        constraint: &PlConstraintRef,
        engine: &mut dyn Engine,
    ) {
        if !constraint.borrow().is_active() {
            return;
        }
        let id = constraint.borrow().id();
        let count = self.constraint_violation_counts.entry(id).or_insert(0);
        *count += 1;
        if *count >= self.constraint_violation_threshold {
            self.need_to_split = true;
            if !self.pick_split_constraint(engine) {
                self.constraint_for_splitting = Some(Rc::clone(constraint));
            }
        }
    }

    /// Times `constraint` has been reported violated.
    pub fn violation_count(&self, constraint_id: usize) -> u32 {
        self.constraint_violation_counts.get(&constraint_id).copied().unwrap_or(0)
    }

    /// Record that the local search rejected another phase-pattern
    /// proposal. At the rejection threshold the engine's pending
    /// tightenings and valid case splits are flushed and a split candidate
    /// is chosen, falling back to the score tracker's top unfixed
    /// constraint.
    pub fn report_rejected_phase_pattern_proposal(
        &mut self,
        engine: &mut dyn Engine,
    ) -> Result<()> {
        self.num_rejected_phase_pattern_proposals += 1;

        if self.num_rejected_phase_pattern_proposals >= self.phase_pattern_rejection_threshold {
            self.need_to_split = true;
            engine.apply_all_bound_tightenings()?;
            engine.apply_all_valid_constraint_case_splits()?;
            if !self.pick_split_constraint(engine) {
                self.constraint_for_splitting =
                    self.score_tracker.as_ref().and_then(|tracker| tracker.top_unfixed());
            }
        }
        Ok(())
    }

    /// True when a split is due.
    pub fn need_to_split(&self) -> bool {
        self.need_to_split
    }

    fn pick_split_constraint(&mut self, engine: &mut dyn Engine) -> bool {
        if self.need_to_split {
            self.constraint_for_splitting = engine.pick_split_pl_constraint(self.branching_strategy);
        }
        self.constraint_for_splitting.is_some()
    }

    /// Depth of the decision stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Splits implied before any decision was made.
    pub fn implied_valid_splits_at_root(&self) -> &[CaseSplit] {
        &self.implied_valid_splits_at_root
    }

    /// Branch on the chosen candidate.
    ///
    /// Preconditions: [`SmtCore::need_to_split`] and a candidate set. If
    /// the candidate has become inactive since it was chosen, the split
    /// state is cleared and no frame is created; callers must not assume a
    /// split occurred.
    pub fn perform_split(&mut self, engine: &mut dyn Engine) {
        debug_assert!(self.need_to_split);
        self.num_rejected_phase_pattern_proposals = 0;

        let Some(constraint) = self.constraint_for_splitting.take() else {
            debug_assert!(false, "perform_split without a candidate");
            return;
        };

        if !constraint.borrow().is_active() {
            self.need_to_split = false;
            self.constraint_violation_counts.insert(constraint.borrow().id(), 0);
            return;
        }

        let start = Instant::now();
        self.need_to_split = false;

        if let Some(stats) = &self.statistics {
            let mut stats = stats.borrow_mut();
            stats.num_splits += 1;
            stats.num_visited_tree_states += 1;
        }

        // The case list is taken before deactivation, and the snapshot
        // after it, so the stored state records the constraint as split-on.
        let splits = constraint.borrow().case_splits();
        debug_assert!(splits.len() >= 2);
        constraint.borrow_mut().set_active(false);

        let mut engine_state = engine.store_state(TableauStateStorageLevel::BoundsOnly);
        engine_state.state_id = self.state_id;
        self.state_id += 1;

        engine.pre_context_push_hook();
        self.push_context();

        if engine.should_produce_proofs()
            && let Some(current) = engine.certificate_current()
        {
            if let Some(tree) = engine.certificate_tree_mut() {
                for split in &splits {
                    tree.add_child(current, split.clone());
                }
            }
            let first_child = engine
                .certificate_tree()
                .and_then(|tree| tree.child_by_split(current, &splits[0]));
            if let Some(child) = first_child {
                engine.set_certificate_current(child);
            }
        }

        let mut remaining: VecDeque<CaseSplit> = splits.into();
        let Some(first) = remaining.pop_front() else {
            debug_assert!(false, "splittable constraint produced no cases");
            return;
        };
        debug_assert!(first.equations().is_empty());

        tracing::debug!(cases = remaining.len() + 1, "performing a split");
        engine.apply_split(&first);

        self.stack.push(SmtStackEntry {
            active_split: first,
            alternative_splits: remaining,
            implied_valid_splits: Vec::new(),
            engine_state,
        });

        if let Some(stats) = &self.statistics {
            let mut stats = stats.borrow_mut();
            stats.set_current_decision_level(self.stack.len() as u32);
            stats.total_decision_core_time_micros += start.elapsed().as_micros() as u64;
        }

        debug_assert!(engine.external_split_mode() || self.stack.len() == self.context.level());
    }

    /// Backtrack: drop exhausted frames, then advance the next frame to its
    /// following case, repeating while the engine reports inconsistent
    /// bounds after application. Returns `false` when the stack empties,
    /// i.e. the query is unsatisfiable.
    pub fn pop_split(&mut self, engine: &mut dyn Engine) -> Result<bool> {
        tracing::debug!("performing a pop");

        if self.stack.is_empty() {
            return Ok(false);
        }

        let start = Instant::now();
        if let Some(stats) = &self.statistics {
            let mut stats = stats.borrow_mut();
            stats.num_pops += 1;
            // A pop always lands on a state not seen before, whether a
            // sibling case or a lower level of the tree.
            stats.num_visited_tree_states += 1;
        }

        loop {
            // Drop frames with no cases left to try.
            while self.stack.last().is_some_and(|entry| entry.alternative_splits.is_empty()) {
                if self.check_skew_from_debugging_solution()? {
                    tracing::error!("popping from a compliant stack");
                    return Err(Error::Debugging("popping from a compliant stack"));
                }

                self.stack.pop();
                self.pop_context();

                if engine.should_produce_proofs()
                    && let Some(current) = engine.certificate_current()
                {
                    let parent = engine.certificate_tree().and_then(|tree| tree.parent(current));
                    if let Some(parent) = parent {
                        engine.set_certificate_current(parent);
                    }
                }

                if self.stack.is_empty() {
                    return Ok(false);
                }
            }

            if self.check_skew_from_debugging_solution()? {
                tracing::error!("popping from a compliant stack");
                return Err(Error::Debugging("popping from a compliant stack"));
            }

            self.pop_context();
            engine.post_context_pop_hook();

            let top = self.stack.len() - 1;
            tracing::debug!("restoring engine state");
            engine.restore_state(&self.stack[top].engine_state)?;

            // Valid splits learned under the abandoned case die with it.
            self.stack[top].implied_valid_splits.clear();
            let Some(split) = self.stack[top].alternative_splits.pop_front() else {
                debug_assert!(false, "frame with no alternatives survived the drop loop");
                return Ok(false);
            };

            // Point the proof tree at the sibling being entered; the node
            // may live further up when exhausted frames were just dropped.
            if engine.should_produce_proofs()
                && let Some(current) = engine.certificate_current()
            {
                let target = engine.certificate_tree().and_then(|tree| {
                    let mut node = current;
                    loop {
                        if let Some(child) = tree.child_by_split(node, &split) {
                            return Some(child);
                        }
                        node = tree.parent(node)?;
                    }
                });
                if let Some(target) = target {
                    engine.set_certificate_current(target);
                }
            }

            debug_assert!(split.equations().is_empty());
            tracing::debug!("applying the next case");
            engine.pre_context_push_hook();
            self.push_context();
            engine.apply_split(&split);
            self.stack[top].active_split = split;

            if engine.consistent_bounds() {
                break;
            }
            if engine.should_produce_proofs() {
                engine.explain_simplex_failure();
            }
        }

        if let Some(stats) = &self.statistics {
            let mut stats = stats.borrow_mut();
            stats.set_current_decision_level(self.stack.len() as u32);
            stats.total_decision_core_time_micros += start.elapsed().as_micros() as u64;
        }

        self.check_skew_from_debugging_solution()?;
        debug_assert!(engine.external_split_mode() || self.stack.len() == self.context.level());

        Ok(true)
    }

    /// Record a split proved unconditionally valid at the current level.
    pub fn record_implied_valid_split(&mut self, split: CaseSplit) -> Result<()> {
        match self.stack.last_mut() {
            Some(entry) => entry.implied_valid_splits.push(split),
            None => self.implied_valid_splits_at_root.push(split),
        }
        self.check_skew_from_debugging_solution()?;
        Ok(())
    }

    /// Every split currently in force: root-implied splits first, then per
    /// frame the active case followed by its implied-valid splits.
    pub fn all_splits_so_far(&self) -> Vec<CaseSplit> {
        let mut result = self.implied_valid_splits_at_root.clone();
        for entry in &self.stack {
            result.push(entry.active_split.clone());
            result.extend(entry.implied_valid_splits.iter().cloned());
        }
        result
    }

    /// Clear violation counts, rejection counts and the needs-split flag.
    pub fn reset_split_conditions(&mut self) {
        self.constraint_violation_counts.clear();
        self.num_rejected_phase_pattern_proposals = 0;
        self.need_to_split = false;
    }

    /// Return to decision level 0, dropping all frames and bookkeeping.
    pub fn reset(&mut self, engine: &mut dyn Engine) {
        self.context.pop_to(0);
        engine.post_context_pop_hook();
        self.stack.clear();
        self.implied_valid_splits_at_root.clear();
        self.need_to_split = false;
        self.constraint_for_splitting = None;
        self.state_id = 0;
        self.constraint_violation_counts.clear();
        self.num_rejected_phase_pattern_proposals = 0;
    }

    /// Among `violated`, the constraint to fix next: the least-fixed one
    /// when the least-fix heuristic is on, the first otherwise.
    pub fn choose_violated_constraint_for_fixing(
        &self,
        violated: &[PlConstraintRef],
    ) -> Option<PlConstraintRef> {
        debug_assert!(!violated.is_empty());
        if !self.use_least_fix {
            return violated.first().cloned();
        }
        violated
            .iter()
            .min_by_key(|constraint| self.violation_count(constraint.borrow().id()))
            .cloned()
    }

    // ------------------------------------------------------------------
    // Serialized decision paths.
    // ------------------------------------------------------------------

    /// Serialize the current decision path.
    pub fn store_smt_state(&self) -> SmtState {
        SmtState {
            implied_valid_splits_at_root: self.implied_valid_splits_at_root.clone(),
            stack: self
                .stack
                .iter()
                .map(|entry| SmtReplayEntry {
                    active_split: entry.active_split.clone(),
                    alternative_splits: entry.alternative_splits.clone(),
                    implied_valid_splits: entry.implied_valid_splits.clone(),
                })
                .collect(),
            state_id: self.state_id,
        }
    }

    /// Re-enter one frame of a serialized decision path.
    ///
    /// Replay captures a full-tableau snapshot and re-applies the frame's
    /// active and implied splits. It does not push a context level: replay
    /// runs in the external-split submode, where frames arrive from outside
    /// and the depth == level invariant is waived.
    pub fn replay_smt_stack_entry(&mut self, entry: SmtReplayEntry, engine: &mut dyn Engine) {
        let start = Instant::now();
        if let Some(stats) = &self.statistics {
            let mut stats = stats.borrow_mut();
            stats.num_splits += 1;
            stats.num_visited_tree_states += 1;
        }

        let mut engine_state = engine.store_state(TableauStateStorageLevel::EntireTableau);
        engine_state.state_id = self.state_id;
        self.state_id += 1;

        engine.apply_split(&entry.active_split);
        for split in &entry.implied_valid_splits {
            engine.apply_split(split);
        }

        self.stack.push(SmtStackEntry {
            active_split: entry.active_split,
            alternative_splits: entry.alternative_splits,
            implied_valid_splits: entry.implied_valid_splits,
            engine_state,
        });

        if let Some(stats) = &self.statistics {
            let mut stats = stats.borrow_mut();
            stats.set_current_decision_level(self.stack.len() as u32);
            stats.total_decision_core_time_micros += start.elapsed().as_micros() as u64;
        }
    }

    // ------------------------------------------------------------------
    // Debugging-solution compliance.
    // ------------------------------------------------------------------

    /// Register a known-satisfying assignment; the stack will be checked
    /// against it on every pop and implied-split recording.
    pub fn store_debugging_solution(&mut self, solution: FxHashMap<usize, f64>) {
        self.debugging_solution = solution;
    }

    /// True when the stack is compliant with the stored solution (false
    /// when no solution is stored). A contradiction that cannot be escaped
    /// through remaining alternatives is an error.
    pub fn check_skew_from_debugging_solution(&self) -> Result<bool> {
        if self.debugging_solution.is_empty() {
            return Ok(false);
        }

        for split in &self.implied_valid_splits_at_root {
            if let Some(detail) = self.split_excludes_stored_solution(split) {
                tracing::error!(%detail, "root-implied split contradicts the stored solution");
                return Err(Error::Debugging("root-implied split contradicts the stored solution"));
            }
        }

        // Oldest to newest: each level must keep the solution reachable.
        for entry in &self.stack {
            if let Some(detail) = self.split_excludes_stored_solution(&entry.active_split) {
                if entry.alternative_splits.is_empty() {
                    tracing::error!(
                        %detail,
                        "active split contradicts the stored solution with no alternatives"
                    );
                    return Err(Error::Debugging(
                        "active split contradicts the stored solution with no alternatives",
                    ));
                }
                // Non-compliant but escapable through a sibling case.
                return Ok(false);
            }

            for split in &entry.implied_valid_splits {
                if let Some(detail) = self.split_excludes_stored_solution(split) {
                    tracing::error!(%detail, "implied split contradicts the stored solution");
                    return Err(Error::Debugging("implied split contradicts the stored solution"));
                }
            }
        }

        Ok(true)
    }

    /// `Some(detail)` when `split` rules out the stored solution.
    fn split_excludes_stored_solution(&self, split: &CaseSplit) -> Option<String> {
        for bound in split.bound_tightenings() {
            let Some(&solution_value) = self.debugging_solution.get(&bound.variable) else {
                continue;
            };
            match bound.kind {
                BoundKind::Lower if float_utils::gt(bound.value, solution_value) => {
                    return Some(format!(
                        "variable {}: new lower bound {:.5} contradicts possible solution {:.5}",
                        bound.variable, bound.value, solution_value
                    ));
                }
                BoundKind::Upper if float_utils::lt(bound.value, solution_value) => {
                    return Some(format!(
                        "variable {}: new upper bound {:.5} contradicts possible solution {:.5}",
                        bound.variable, bound.value, solution_value
                    ));
                }
                _ => {}
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Context plumbing.
    // ------------------------------------------------------------------

    fn push_context(&mut self) {
        let start = Instant::now();
        self.context.push();
        if let Some(stats) = &self.statistics {
            let mut stats = stats.borrow_mut();
            stats.num_context_pushes += 1;
            stats.time_context_push_micros += start.elapsed().as_micros() as u64;
        }
    }

    fn pop_context(&mut self) {
        let start = Instant::now();
        self.context.pop();
        if let Some(stats) = &self.statistics {
            let mut stats = stats.borrow_mut();
            stats.num_context_pops += 1;
            stats.time_context_pop_micros += start.elapsed().as_micros() as u64;
        }
    }
}
