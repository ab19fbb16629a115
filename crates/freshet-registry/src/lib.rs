//! freshet-registry — the single mutation point for cluster CPU capacity.
//!
//! Wraps the state store's node table behind atomic reserve/release
//! operations. Every capacity change goes through one internal mutex, so a
//! reservation is validated and committed as a single step and two jobs can
//! never race each other onto the same CPUs.
//!
//! Store access is retried with bounded exponential backoff; exhausting the
//! retries is fatal only for the requesting operation.

pub mod error;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use registry::ResourceRegistry;
