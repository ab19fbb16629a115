//! Domain types for the Freshet scheduling engine.
//!
//! These types represent the persisted state of cluster nodes and model-run
//! jobs. All types serialize to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a cluster compute node.
pub type NodeId = u32;

// ── Nodes ─────────────────────────────────────────────────────────

/// A cluster compute host with fixed total CPU capacity and a tracked
/// available count.
///
/// Invariant: `available_cpus <= total_cpus` at all times. The registry is
/// the only component that mutates `available_cpus`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceNode {
    pub id: NodeId,
    pub hostname: String,
    pub total_cpus: u32,
    pub available_cpus: u32,
}

impl ResourceNode {
    /// Create a node with all CPUs available.
    pub fn new(id: NodeId, hostname: impl Into<String>, total_cpus: u32) -> Self {
        Self {
            id,
            hostname: hostname.into(),
            total_cpus,
            available_cpus: total_cpus,
        }
    }
}

// ── Allocation ────────────────────────────────────────────────────

/// Strategy governing how a CPU request is spread across cluster nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationParadigm {
    /// Fill each node in id order before touching the next.
    FillNodes,
    /// One CPU per node per pass, cycling until satisfied.
    RoundRobin,
    /// The entire request must fit on one node.
    SingleNode,
}

/// A granted slice of one node's CPUs.
///
/// Invariant: `cpu_count > 0`; a job's allocations reference distinct nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub node_id: NodeId,
    pub cpu_count: u32,
}

// ── Jobs ──────────────────────────────────────────────────────────

/// A validated model-run request as accepted from the request gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelRequest {
    /// Total MPI process count to run.
    pub cpu_count: u32,
    pub paradigm: AllocationParadigm,
    /// Hydrofabric dataset id (the spatial domain to partition).
    pub hydrofabric_id: String,
    /// Forcings dataset id.
    pub forcings_id: String,
    /// Realization configuration dataset id.
    pub realization_config_id: String,
    /// Pre-existing partition config; when present the partitioning step
    /// is skipped.
    pub partition_config_id: Option<String>,
}

/// Lifecycle state of a job.
///
/// Transitions are monotonic and one-directional:
/// `Queued → Allocating → Partitioning → Launching → Running →
/// {Completed | Failed} → Released`. `Released` is terminal and marks the
/// point at which all reserved capacity has been returned to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Allocating,
    Partitioning,
    Launching,
    Running,
    Completed,
    Failed,
    Released,
}

impl JobState {
    /// Whether the job has reached a terminal outcome.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Released)
    }

    /// Whether a cancellation at this state is immediate (no running
    /// process group to tear down yet).
    pub fn cancel_is_immediate(self) -> bool {
        matches!(self, Self::Queued | Self::Allocating | Self::Partitioning)
    }
}

/// Persisted record of a job through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRecord {
    pub id: String,
    pub request: ModelRequest,
    pub state: JobState,
    /// Granted allocations, in the order the allocator produced them.
    /// Invariant: once state is `Launching` or later, the counts sum to
    /// exactly `request.cpu_count`.
    pub allocations: Vec<Allocation>,
    /// Partition config in effect (granted or carried on the request).
    pub partition_config_id: Option<String>,
    /// Hostfile lines handed to the launcher, allocation order preserved.
    pub hostfile: Option<Vec<String>>,
    pub exit_code: Option<i32>,
    pub failure_reason: Option<String>,
    /// Unix timestamp (seconds) when the job was submitted.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last state change.
    pub updated_at: u64,
}

impl JobRecord {
    /// Create a freshly queued record for a validated request.
    pub fn new(id: impl Into<String>, request: ModelRequest) -> Self {
        let now = epoch_secs();
        Self {
            id: id.into(),
            request,
            state: JobState::Queued,
            allocations: Vec::new(),
            partition_config_id: None,
            hostfile: None,
            exit_code: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance the lifecycle state, refreshing `updated_at`.
    pub fn set_state(&mut self, state: JobState) {
        self.state = state;
        self.updated_at = epoch_secs();
    }

    /// Total CPUs across granted allocations.
    pub fn allocated_cpus(&self) -> u32 {
        self.allocations.iter().map(|a| a.cpu_count).sum()
    }
}

/// Current Unix epoch in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            cpu_count: 8,
            paradigm: AllocationParadigm::FillNodes,
            hydrofabric_id: "hydrofabric-01".to_string(),
            forcings_id: "forcings-01".to_string(),
            realization_config_id: "realization-01".to_string(),
            partition_config_id: None,
        }
    }

    #[test]
    fn node_starts_fully_available() {
        let node = ResourceNode::new(3, "compute-03", 16);
        assert_eq!(node.available_cpus, node.total_cpus);
    }

    #[test]
    fn paradigm_wire_names() {
        let json = serde_json::to_string(&AllocationParadigm::FillNodes).unwrap();
        assert_eq!(json, "\"FILL_NODES\"");
        let parsed: AllocationParadigm = serde_json::from_str("\"ROUND_ROBIN\"").unwrap();
        assert_eq!(parsed, AllocationParadigm::RoundRobin);
        let parsed: AllocationParadigm = serde_json::from_str("\"SINGLE_NODE\"").unwrap();
        assert_eq!(parsed, AllocationParadigm::SingleNode);
    }

    #[test]
    fn state_ordering_is_monotonic() {
        assert!(JobState::Queued < JobState::Allocating);
        assert!(JobState::Allocating < JobState::Partitioning);
        assert!(JobState::Partitioning < JobState::Launching);
        assert!(JobState::Launching < JobState::Running);
        assert!(JobState::Running < JobState::Completed);
        assert!(JobState::Failed < JobState::Released);
    }

    #[test]
    fn terminal_and_cancel_classification() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Released.is_terminal());
        assert!(!JobState::Running.is_terminal());

        assert!(JobState::Queued.cancel_is_immediate());
        assert!(JobState::Partitioning.cancel_is_immediate());
        assert!(!JobState::Launching.cancel_is_immediate());
        assert!(!JobState::Running.cancel_is_immediate());
    }

    #[test]
    fn new_record_is_queued_and_empty() {
        let record = JobRecord::new("job-1", request());
        assert_eq!(record.state, JobState::Queued);
        assert!(record.allocations.is_empty());
        assert_eq!(record.allocated_cpus(), 0);
        assert!(record.hostfile.is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn set_state_refreshes_updated_at() {
        let mut record = JobRecord::new("job-1", request());
        record.updated_at = 0;
        record.set_state(JobState::Allocating);
        assert_eq!(record.state, JobState::Allocating);
        assert!(record.updated_at > 0);
    }

    #[test]
    fn allocated_cpus_sums_all_slices() {
        let mut record = JobRecord::new("job-1", request());
        record.allocations = vec![
            Allocation { node_id: 1, cpu_count: 4 },
            Allocation { node_id: 2, cpu_count: 2 },
        ];
        assert_eq!(record.allocated_cpus(), 6);
    }
}
