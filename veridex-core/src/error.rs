//! Error surface of the search core.

/// Errors surfaced by the search-and-deduction core.
///
/// Infeasibility is the only structured error the search driver reacts to:
/// it unwinds the current tightening or split application and triggers a
/// backtrack. It is deliberately *not* caught inside the tightener or the
/// bound manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The current bounds admit no solution: some variable's lower bound
    /// exceeds its upper bound.
    #[error("infeasible query")]
    InfeasibleQuery,

    /// The decision stack disagrees with a stored debugging solution.
    /// Raised only when a possible solution was registered for debugging.
    #[error("debugging check failed: {0}")]
    Debugging(&'static str),
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;
