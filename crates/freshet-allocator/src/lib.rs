//! freshet-allocator — deterministic CPU placement across cluster nodes.
//!
//! Pure decision logic: given a CPU request, an allocation paradigm, and a
//! capacity snapshot, compute the node/CPU assignments or fail with
//! insufficient capacity. No I/O, no mutation — committing the decision is
//! the registry's job, which keeps every paradigm all-or-nothing.
//!
//! Nodes are always considered in ascending node id order so results are
//! reproducible and testable.

pub mod allocator;
pub mod error;

pub use allocator::allocate;
pub use error::{AllocError, AllocResult};
