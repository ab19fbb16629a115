//! redb table definitions for the Freshet state store.
//!
//! Values are JSON-serialized domain types. The node table is keyed by the
//! numeric node id so that iteration yields nodes in ascending id order,
//! which is the traversal order the allocator is specified against.

use redb::TableDefinition;

/// Cluster nodes keyed by numeric node id.
pub const NODES: TableDefinition<u32, &[u8]> = TableDefinition::new("nodes");

/// Job records keyed by job id.
pub const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");
