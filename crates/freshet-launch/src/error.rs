//! Launch path error types.

use thiserror::Error;

/// Result type alias for launch operations.
pub type LaunchResult<T> = Result<T, LaunchError>;

/// Errors on the way from allocation to a supervised run.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// A granted host never became ready within the probe budget.
    #[error("host never became ready: {host}")]
    HostUnreachable { host: String },

    #[error("failed to spawn process group: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed waiting on process group: {0}")]
    Wait(#[source] std::io::Error),

    #[error("scratch directory error: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("cluster orchestrator error: {0}")]
    Orchestrator(String),
}
