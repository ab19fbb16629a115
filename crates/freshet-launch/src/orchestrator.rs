//! Cluster orchestrator boundary.
//!
//! The scheduler talks to the container scheduler for two things: scaling
//! the worker pool and terminating a job's service after launch. Node
//! reachability is the [`crate::probe::ReadinessProbe`]'s concern.
//! Everything behind this trait is external.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{LaunchError, LaunchResult};

/// Interface to the cluster's container scheduler.
#[async_trait]
pub trait ClusterOrchestrator: Send + Sync {
    /// Scale the worker pool to `replicas`.
    async fn scale_workers(&self, replicas: u32) -> LaunchResult<()>;

    /// Tear down the service stack of a launched job.
    async fn terminate(&self, job_id: &str) -> LaunchResult<()>;
}

/// Docker Swarm orchestrator driven through the `docker` CLI.
///
/// Worker services are named `<service_prefix>` for the shared pool and
/// `<service_prefix>-<job_id>` for per-job stacks.
pub struct SwarmOrchestrator {
    binary: String,
    service_prefix: String,
}

impl SwarmOrchestrator {
    pub fn new(service_prefix: impl Into<String>) -> Self {
        Self {
            binary: "docker".to_string(),
            service_prefix: service_prefix.into(),
        }
    }

    /// Override the CLI binary (for tests).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn run_cli(&self, args: &[String]) -> LaunchResult<()> {
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| LaunchError::Orchestrator(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(?args, %stderr, "orchestrator command failed");
            Err(LaunchError::Orchestrator(stderr))
        }
    }
}

#[async_trait]
impl ClusterOrchestrator for SwarmOrchestrator {
    async fn scale_workers(&self, replicas: u32) -> LaunchResult<()> {
        info!(replicas, service = %self.service_prefix, "scaling worker pool");
        self.run_cli(&[
            "service".to_string(),
            "scale".to_string(),
            format!("{}={replicas}", self.service_prefix),
        ])
        .await
    }

    async fn terminate(&self, job_id: &str) -> LaunchResult<()> {
        info!(%job_id, "terminating job service");
        self.run_cli(&[
            "service".to_string(),
            "rm".to_string(),
            format!("{}-{job_id}", self.service_prefix),
        ])
        .await
    }
}
