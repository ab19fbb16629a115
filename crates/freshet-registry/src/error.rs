//! Registry error types.

use thiserror::Error;

use freshet_state::NodeId;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur during capacity registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("reservation conflict on node {node_id}: requested {requested}, only {available} available")]
    ReserveConflict {
        node_id: NodeId,
        requested: u32,
        available: u32,
    },

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("state store unavailable after {attempts} attempts: {last_error}")]
    StoreUnavailable { attempts: u32, last_error: String },
}
