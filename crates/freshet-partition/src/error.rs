//! Partitioner client error types.

use thiserror::Error;

/// Result type alias for partitioner operations.
pub type PartitionResult<T> = Result<T, PartitionError>;

/// Errors surfaced by the partitioner client.
#[derive(Debug, Error)]
pub enum PartitionError {
    /// The partitioner refused the domain/allocation pairing.
    #[error("partitioner rejected the request: {0}")]
    Rejected(String),

    /// The partitioner could not be reached or answered garbage.
    #[error("partitioner transport error: {0}")]
    Transport(String),

    #[error("partitioner did not answer within {0:?}")]
    Timeout(std::time::Duration),
}
