use thiserror::Error;

/// Errors reported by world mutation entry points.
///
/// Numeric degeneracy inside the solver (singular pulleys, zero-length
/// distance constraints, ill-conditioned contact blocks) is not an error:
/// the affected constraint is skipped for the step and a warning is logged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    /// Creation or destruction was attempted while the world is stepping.
    /// The operation did not run; retry after the step returns.
    #[error("world is locked: {0} is not allowed during a step")]
    Locked(&'static str),

    /// A definition failed validation. Nothing was created.
    #[error("invalid definition: {0}")]
    InvalidArgument(&'static str),

    /// A handle referenced an entity that no longer exists in its pool.
    #[error("stale handle: {0}")]
    StaleHandle(&'static str),
}
