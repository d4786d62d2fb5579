//! Veridex Core — the search-and-deduction engine of the Veridex verifier.
//!
//! This crate decides satisfiability of a linear-arithmetic problem
//! augmented with piecewise-linear constraints (rectifier activations and
//! friends): real-valued variables with interval bounds, a sparse linear
//! system `A·x = b`, and constraints whose cases are disjunctions of bound
//! tightenings. It provides:
//!
//! - [`BoundManager`] — context-versioned interval bounds with a tightening
//!   log, an infeasibility flag, and optional per-bound explanation vectors
//!   for proof production
//! - [`RowBoundTightener`] — bound deduction from constraint-matrix rows and
//!   inverted-basis tableau rows, iterated to saturation
//! - [`SmtCore`] — the decision stack over case splits: branching
//!   heuristics, push/pop with state snapshots, implied-split bookkeeping
//! - [`CertificateTree`] — the proof object mirroring the decision tree
//! - [`Engine`] — the façade contract the decision stack drives
//!
//! The simplex pivoting kernel and the problem-format parsers live outside
//! this crate; the tightener consumes the tableau through the read-only
//! [`TableauView`] oracle.
//!
//! # Examples
//!
//! ## Interval propagation over a row
//!
//! ```
//! use veridex_context::Context;
//! use veridex_core::{BoundManager, BoundTighteningType, Config, DenseTableau, RowBoundTightener};
//!
//! let ctx = Context::new();
//! let mut bounds = BoundManager::new(&ctx);
//! bounds.initialize(3);
//! for v in 0..3 {
//!     bounds.set_lower_bound(v, 0.0);
//!     bounds.set_upper_bound(v, 1.0);
//! }
//!
//! // x0 + x1 + x2 = 3 over [0, 1]³ pins every variable to 1.
//! let tableau = DenseTableau::new(1, 3, vec![1.0, 1.0, 1.0], vec![3.0], vec![0]);
//! let config = Config {
//!     bound_tightening_type: BoundTighteningType::ConstraintMatrix,
//!     ..Config::default()
//! };
//! let mut tightener = RowBoundTightener::new(&config);
//! tightener.set_dimensions(&tableau);
//! tightener.examine_constraint_matrix(&tableau, &mut bounds, true).unwrap();
//! assert_eq!(bounds.lower_bound(0), 1.0);
//! ```
//!
//! ## Transactional bounds
//!
//! ```
//! use veridex_context::Context;
//! use veridex_core::BoundManager;
//!
//! let ctx = Context::new();
//! let mut bounds = BoundManager::new(&ctx);
//! bounds.initialize(1);
//!
//! bounds.store_local_bounds();
//! ctx.push();
//! bounds.set_lower_bound(0, 2.5);
//! ctx.pop();
//! bounds.restore_local_bounds();
//! assert_eq!(bounds.lower_bound(0), f64::NEG_INFINITY);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bound_manager;
pub mod certificate;
pub mod config;
pub mod constraint;
pub mod engine;
pub mod error;
pub mod explainer;
pub mod float_utils;
pub mod row_tightener;
pub mod score_tracker;
pub mod smt_core;
pub mod sparse;
pub mod statistics;
pub mod tableau;
pub mod tightening;

pub use bound_manager::BoundManager;
pub use certificate::{CertificateTree, NodeId};
pub use config::{BoundTighteningType, BranchingStrategy, Config};
pub use constraint::{
    CaseSplit, Equation, PiecewiseLinearConstraint, PlConstraintRef, ReluConstraint, ReluPhase,
};
pub use engine::{Engine, EngineState, TableauSnapshot, TableauStateStorageLevel};
pub use error::{Error, Result};
pub use explainer::BoundExplainer;
pub use row_tightener::RowBoundTightener;
pub use score_tracker::PseudoImpactTracker;
pub use smt_core::{SmtCore, SmtReplayEntry, SmtStackEntry, SmtState};
pub use sparse::{RowEntry, SparseEntry, SparseRow, TableauRow};
pub use statistics::Statistics;
pub use tableau::{DenseTableau, TableauView};
pub use tightening::{BoundKind, Tightening};

// The context primitives are re-exported so downstream crates need not
// depend on veridex-context directly.
pub use veridex_context::{CdList, Cdo, Context};
