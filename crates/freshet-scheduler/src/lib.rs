//! freshet-scheduler — the job lifecycle state machine.
//!
//! The scheduler owns job records and drives every job through
//! `Queued → Allocating → Partitioning → Launching → Running →
//! {Completed | Failed} → Released`, orchestrating the allocator, the
//! capacity registry, the partitioner, the hostfile builder, and the MPI
//! launcher. Each job runs in its own task; only the
//! snapshot→decide→reserve step is serialized, so a slow or blocked job
//! never stalls allocation decisions for others.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── ResourceRegistry (capacity snapshot, atomic reserve/release)
//!   ├── allocate() (pure paradigm decision, all-or-nothing)
//!   ├── Partitioner (domain decomposition matching the grant)
//!   ├── HostfileBuilder (readiness gate + host:cpus list)
//!   ├── JobLauncher (mpirun supervision to exit)
//!   └── ClusterOrchestrator (termination of launched jobs)
//! ```

pub mod api;
pub mod error;
pub mod scheduler;

pub use api::{JobStatus, SubmitRequest, SubmitResponse};
pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{Scheduler, SchedulerConfig};
