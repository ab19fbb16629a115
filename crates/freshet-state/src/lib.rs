//! freshet-state — domain types and the embedded state store.
//!
//! Holds the persisted state of the scheduling engine: the cluster node
//! inventory (with tracked CPU availability) and job records as they move
//! through the lifecycle. All values are JSON-serialized into redb tables;
//! an in-memory backend exists for tests.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::{
    Allocation, AllocationParadigm, JobRecord, JobState, ModelRequest, NodeId, ResourceNode,
    epoch_secs,
};
