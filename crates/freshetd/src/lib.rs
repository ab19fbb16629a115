//! freshetd — the Freshet daemon.
//!
//! Assembles the node inventory, the capacity registry, the partitioner
//! client, the MPI launcher, and the scheduler behind one REST gateway.

pub mod api;
pub mod config;

pub use api::build_router;
pub use config::InventoryConfig;
