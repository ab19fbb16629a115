//! freshet-partition — client for the external domain-partitioner service.
//!
//! A model run's spatial decomposition must match the granted node/CPU
//! allocation exactly, so after capacity is reserved the scheduler asks the
//! partitioner for a decomposition shaped like the grant. The partitioner is
//! an external collaborator; this crate only defines the interface boundary
//! and an HTTP implementation of it.

pub mod client;
pub mod error;

pub use client::{HttpPartitioner, PartitionRequest, PartitionResponse, Partitioner};
pub use error::{PartitionError, PartitionResult};
