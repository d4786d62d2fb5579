//! Counters and timers incremented by the search core.
//!
//! The statistics sink is injected into the components that report into it;
//! a single instance is shared by the tightener and the decision stack of
//! one core instance.

use serde::{Deserialize, Serialize};

/// Aggregated counters for one run of the search core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    /// Bounds tightened from rows of the inverted basis.
    pub num_tightenings_from_explicit_basis: u64,
    /// Bounds tightened from rows of the original constraint matrix.
    pub num_tightenings_from_constraint_matrix: u64,
    /// Bounds tightened from individually examined rows (pivot shortcut).
    pub num_tightenings_from_rows: u64,
    /// Rows examined through the pivot shortcut.
    pub num_rows_examined_by_row_tightener: u64,

    /// Case splits performed.
    pub num_splits: u64,
    /// Pops performed.
    pub num_pops: u64,
    /// Search-tree states visited (every split or pop lands on a new one).
    pub num_visited_tree_states: u64,
    /// Decision level after the most recent split or pop.
    pub current_decision_level: u32,
    /// Deepest decision level reached.
    pub max_decision_level: u32,

    /// Context pushes.
    pub num_context_pushes: u64,
    /// Context pops.
    pub num_context_pops: u64,

    /// Total time spent inside the decision core, in microseconds.
    pub total_decision_core_time_micros: u64,
    /// Time spent in context pushes, in microseconds.
    pub time_context_push_micros: u64,
    /// Time spent in context pops, in microseconds.
    pub time_context_pop_micros: u64,
}

impl Statistics {
    /// Fresh, all-zero statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the decision level reached after a split or pop.
    pub fn set_current_decision_level(&mut self, level: u32) {
        self.current_decision_level = level;
        if level > self.max_decision_level {
            self.max_decision_level = level;
        }
    }

    /// Emit a one-line summary at debug level.
    pub fn log_summary(&self) {
        tracing::debug!(
            splits = self.num_splits,
            pops = self.num_pops,
            max_level = self.max_decision_level,
            tightenings_explicit = self.num_tightenings_from_explicit_basis,
            tightenings_matrix = self.num_tightenings_from_constraint_matrix,
            "search core statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_level_tracks_maximum() {
        let mut stats = Statistics::new();
        stats.set_current_decision_level(3);
        stats.set_current_decision_level(7);
        stats.set_current_decision_level(2);
        assert_eq!(stats.current_decision_level, 2);
        assert_eq!(stats.max_decision_level, 7);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut stats = Statistics::new();
        stats.num_splits = 42;
        let json = serde_json::to_string(&stats).unwrap();
        let back: Statistics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.num_splits, 42);
    }
}
