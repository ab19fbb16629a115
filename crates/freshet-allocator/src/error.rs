//! Allocator error types.

use thiserror::Error;

/// Result type alias for allocation decisions.
pub type AllocResult<T> = Result<T, AllocError>;

/// Errors that can occur while computing an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("requested CPU count must be greater than zero")]
    ZeroCpusRequested,

    #[error("insufficient capacity: requested {requested} CPUs, {available} satisfiable under the chosen paradigm")]
    InsufficientCapacity { requested: u32, available: u32 },
}
