//! freshet-launch — the path from a granted allocation to a supervised run.
//!
//! Three pieces, in launch order:
//!
//! - [`HostfileBuilder`] turns an allocation into the `host:cpus` list the
//!   distributed launcher consumes, gated on every host passing a bounded
//!   readiness probe.
//! - [`JobScratch`] is the per-job working directory (hostfile + dataset
//!   links); it cleans itself up on drop, whatever the run's outcome.
//! - [`MpiLauncher`] starts the MPI process group and supervises it to
//!   exit, capturing the exit code and a stderr tail for diagnostics.
//!
//! The [`ClusterOrchestrator`] trait is the boundary to the container
//! scheduler: worker scaling, job termination, and node reachability.

pub mod error;
pub mod hostfile;
pub mod launcher;
pub mod orchestrator;
pub mod probe;
pub mod scratch;

pub use error::{LaunchError, LaunchResult};
pub use hostfile::{HostEntry, Hostfile, HostfileBuilder};
pub use launcher::{JobLauncher, LaunchSpec, MpiLauncher, RunOutcome};
pub use orchestrator::{ClusterOrchestrator, SwarmOrchestrator};
pub use probe::{ReadinessProbe, TcpProbe};
pub use scratch::JobScratch;
