//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur while scheduling and supervising jobs.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Allocation(#[from] freshet_allocator::AllocError),

    #[error("registry error: {0}")]
    Registry(#[from] freshet_registry::RegistryError),

    #[error("partitioning failed: {0}")]
    Partition(#[from] freshet_partition::PartitionError),

    #[error(transparent)]
    Launch(#[from] freshet_launch::LaunchError),

    #[error("state store error: {0}")]
    State(#[from] freshet_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
