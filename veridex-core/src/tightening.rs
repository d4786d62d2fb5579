//! Bound-change records.

use serde::{Deserialize, Serialize};

/// Which side of a variable's interval a bound refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundKind {
    /// A lower bound.
    Lower,
    /// An upper bound.
    Upper,
}

/// One accepted bound change: `variable`'s `kind` bound became `value`.
///
/// Tightenings are logged by the bound manager in acceptance order and
/// drained by callers that propagate bounds outward (e.g. into the tableau).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tightening {
    /// The variable whose bound changed.
    pub variable: usize,
    /// The new bound value.
    pub value: f64,
    /// Which bound changed.
    pub kind: BoundKind,
}

impl Tightening {
    /// Construct a tightening record.
    pub fn new(variable: usize, value: f64, kind: BoundKind) -> Self {
        Self { variable, value, kind }
    }

    /// A new lower bound for `variable`.
    pub fn lower(variable: usize, value: f64) -> Self {
        Self::new(variable, value, BoundKind::Lower)
    }

    /// A new upper bound for `variable`.
    pub fn upper(variable: usize, value: f64) -> Self {
        Self::new(variable, value, BoundKind::Upper)
    }
}
