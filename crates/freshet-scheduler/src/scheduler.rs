//! The scheduler: job lifecycle driver.
//!
//! Each submitted job runs in its own task that walks the lifecycle
//! states, persisting every transition before acting on it. Allocation
//! decisions are serialized behind one mutex so the snapshot a decision
//! is made from cannot go stale between decide and reserve; everything
//! after the reservation runs concurrently across jobs.
//!
//! Whatever path a job takes out of the pipeline, its reserved capacity
//! is returned exactly once and the record ends in `Released`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use freshet_allocator::allocate;
use freshet_launch::{
    ClusterOrchestrator, HostEntry, HostfileBuilder, JobLauncher, JobScratch, LaunchSpec,
};
use freshet_partition::Partitioner;
use freshet_registry::{RegistryError, ResourceRegistry};
use freshet_state::{Allocation, JobRecord, JobState, ModelRequest, StateStore};

use crate::api::JobStatus;
use crate::error::{SchedulerError, SchedulerResult};

/// Poll interval used by [`Scheduler::wait_released`].
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Static scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base directory for per-job scratch directories.
    pub scratch_base: PathBuf,
    /// Where dataset directories live; when set, the job's hydrofabric,
    /// forcings, and realization datasets are linked into its scratch.
    pub dataset_base: Option<PathBuf>,
    /// The model executable handed to the MPI launcher.
    pub model_program: String,
}

/// Drives jobs from submission to release.
///
/// The persisted [`JobRecord`] is authoritative; the in-memory map only
/// holds the cancellation handle of each live driver task.
pub struct Scheduler {
    registry: Arc<ResourceRegistry>,
    store: StateStore,
    partitioner: Arc<dyn Partitioner>,
    hostfiles: Arc<HostfileBuilder>,
    launcher: Arc<dyn JobLauncher>,
    orchestrator: Arc<dyn ClusterOrchestrator>,
    config: SchedulerConfig,
    handles: RwLock<HashMap<String, CancellationToken>>,
    /// Serializes snapshot → decide → reserve across driver tasks.
    alloc_lock: Mutex<()>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: StateStore,
        registry: Arc<ResourceRegistry>,
        partitioner: Arc<dyn Partitioner>,
        hostfiles: Arc<HostfileBuilder>,
        launcher: Arc<dyn JobLauncher>,
        orchestrator: Arc<dyn ClusterOrchestrator>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            store,
            partitioner,
            hostfiles,
            launcher,
            orchestrator,
            config,
            handles: RwLock::new(HashMap::new()),
            alloc_lock: Mutex::new(()),
        }
    }

    // ── Public surface ────────────────────────────────────────────

    /// Accept a validated request: persist a queued record and start its
    /// driver task. Returns the new job id.
    pub async fn submit(self: &Arc<Self>, request: ModelRequest) -> SchedulerResult<String> {
        if request.cpu_count == 0 {
            return Err(SchedulerError::InvalidRequest(
                "cpu_count must be greater than zero".to_string(),
            ));
        }

        let job_id = uuid::Uuid::new_v4().to_string();
        let record = JobRecord::new(job_id.clone(), request);
        self.store.put_job(&record)?;

        let cancel = CancellationToken::new();
        self.handles
            .write()
            .await
            .insert(job_id.clone(), cancel.clone());

        info!(
            %job_id,
            cpus = record.request.cpu_count,
            paradigm = ?record.request.paradigm,
            "job submitted"
        );

        let scheduler = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move { scheduler.drive(id, cancel).await });
        Ok(job_id)
    }

    /// Cancel a job.
    ///
    /// Before launch this just stops the driver at its next checkpoint;
    /// once a process group may exist, the orchestrator is asked to tear
    /// down the job's services first. Cancelling a job that already
    /// reached `Released` is a no-op.
    pub async fn cancel(&self, job_id: &str) -> SchedulerResult<()> {
        let record = self.load(job_id)?;
        if record.state == JobState::Released {
            debug!(%job_id, "cancel after release ignored");
            return Ok(());
        }

        if record.state.cancel_is_immediate() {
            info!(%job_id, state = ?record.state, "cancelling before launch");
        } else {
            info!(%job_id, state = ?record.state, "terminating launched job");
            if let Err(e) = self.orchestrator.terminate(job_id).await {
                // The process group kill below still applies; a missing
                // service stack is the common case here.
                warn!(%job_id, error = %e, "orchestrator termination failed");
            }
        }

        if let Some(handle) = self.handles.read().await.get(job_id) {
            handle.cancel();
        }
        Ok(())
    }

    /// Point-in-time status from the persisted record.
    pub fn status(&self, job_id: &str) -> SchedulerResult<JobStatus> {
        let record = self.load(job_id)?;
        Ok(JobStatus {
            job_id: record.id,
            state: record.state,
            allocations: record.allocations,
            exit_code: record.exit_code,
            failure_reason: record.failure_reason,
        })
    }

    /// Poll until the job reaches `Released` or `timeout` elapses;
    /// returns the last observed status either way.
    pub async fn wait_released(
        &self,
        job_id: &str,
        timeout: Duration,
    ) -> SchedulerResult<JobStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.status(job_id)?;
            if status.state == JobState::Released || Instant::now() >= deadline {
                return Ok(status);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    // ── Driver ────────────────────────────────────────────────────

    async fn drive(self: Arc<Self>, job_id: String, cancel: CancellationToken) {
        // Committed reservation, tracked outside the persisted record so a
        // store failure between reserve and persist cannot orphan it.
        let mut reserved: Vec<Allocation> = Vec::new();
        if let Err(e) = self.run_job(&job_id, &cancel, &mut reserved).await {
            let reason = e.to_string();
            warn!(%job_id, %reason, "job failed");
            if let Err(e) = self.fail_and_release(&job_id, &reason, &reserved).await {
                error!(%job_id, error = %e, "failed to finalize job");
            }
        }
        self.handles.write().await.remove(&job_id);
    }

    /// The happy path. Any error return, including a cancellation hit at
    /// a checkpoint, is turned into a failed, released record by
    /// [`Self::drive`].
    async fn run_job(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
        reserved: &mut Vec<Allocation>,
    ) -> SchedulerResult<()> {
        checkpoint(cancel)?;
        let request = self.load(job_id)?.request;

        // ── Allocating ────────────────────────────────────────────
        self.transition(job_id, JobState::Allocating)?;
        let allocations = {
            let _serial = self.alloc_lock.lock().await;
            checkpoint(cancel)?;
            let snapshot = self.registry.snapshot().await?;
            let allocations = allocate(request.cpu_count, request.paradigm, &snapshot)?;
            self.registry.try_reserve(&allocations).await?;
            allocations
        };
        *reserved = allocations.clone();
        self.update(job_id, |r| r.allocations = allocations.clone())?;
        info!(
            %job_id,
            nodes = allocations.len(),
            cpus = allocations.iter().map(|a| a.cpu_count).sum::<u32>(),
            "capacity reserved"
        );
        checkpoint(cancel)?;

        // ── Partitioning ──────────────────────────────────────────
        self.transition(job_id, JobState::Partitioning)?;
        let partition_config_id = match &request.partition_config_id {
            Some(id) => {
                debug!(%job_id, partition = %id, "reusing partition config");
                id.clone()
            }
            None => {
                let cpus_per_node: Vec<u32> =
                    allocations.iter().map(|a| a.cpu_count).collect();
                tokio::select! {
                    () = cancel.cancelled() => return Err(SchedulerError::Cancelled),
                    granted = self.partitioner.partition(&request.hydrofabric_id, &cpus_per_node) => granted?,
                }
            }
        };
        self.update(job_id, |r| {
            r.partition_config_id = Some(partition_config_id.clone());
        })?;
        checkpoint(cancel)?;

        // ── Launching ─────────────────────────────────────────────
        self.transition(job_id, JobState::Launching)?;
        let entries = self.host_entries(&allocations).await?;
        let hostfile = tokio::select! {
            () = cancel.cancelled() => return Err(SchedulerError::Cancelled),
            built = self.hostfiles.build(entries) => built?,
        };

        // Scratch lives until this function returns, so the directory is
        // removed on every exit path once the run is over.
        let scratch = JobScratch::create(&self.config.scratch_base, job_id)?;
        hostfile.write_to(&scratch.hostfile_path())?;
        if let Some(base) = &self.config.dataset_base {
            scratch.link_dataset("hydrofabric", &base.join(&request.hydrofabric_id))?;
            scratch.link_dataset("forcings", &base.join(&request.forcings_id))?;
            scratch.link_dataset("realization", &base.join(&request.realization_config_id))?;
        }
        self.update(job_id, |r| r.hostfile = Some(hostfile.lines()))?;
        checkpoint(cancel)?;

        // ── Running ───────────────────────────────────────────────
        self.transition(job_id, JobState::Running)?;
        let spec = LaunchSpec {
            job_id: job_id.to_string(),
            hostfile: scratch.hostfile_path(),
            total_processes: hostfile.total_processes(),
            program: self.config.model_program.clone(),
            args: vec![
                request.realization_config_id.clone(),
                partition_config_id.clone(),
            ],
        };
        let outcome = self.launcher.run(&spec, cancel.clone()).await?;

        // ── Terminal ──────────────────────────────────────────────
        let mut record = self.load(job_id)?;
        record.exit_code = outcome.exit_code;
        if outcome.success() {
            record.set_state(JobState::Completed);
            info!(%job_id, "job completed");
        } else {
            record.failure_reason = Some(outcome.diagnostic());
            record.set_state(JobState::Failed);
            warn!(%job_id, reason = ?record.failure_reason, "run failed");
        }
        self.store.put_job(&record)?;

        self.release(job_id, &allocations).await
    }

    /// Resolve allocation node ids to hostnames from a fresh snapshot.
    async fn host_entries(&self, allocations: &[Allocation]) -> SchedulerResult<Vec<HostEntry>> {
        let snapshot = self.registry.snapshot().await?;
        allocations
            .iter()
            .map(|alloc| {
                snapshot
                    .iter()
                    .find(|n| n.id == alloc.node_id)
                    .map(|node| HostEntry {
                        hostname: node.hostname.clone(),
                        cpu_count: alloc.cpu_count,
                    })
                    .ok_or_else(|| RegistryError::UnknownNode(alloc.node_id).into())
            })
            .collect()
    }

    /// Mark the record failed (unless it already reached a terminal
    /// outcome) and return its capacity.
    async fn fail_and_release(
        &self,
        job_id: &str,
        reason: &str,
        reserved: &[Allocation],
    ) -> SchedulerResult<()> {
        let mut record = self.load(job_id)?;
        if !record.state.is_terminal() {
            record.failure_reason = Some(reason.to_string());
            record.set_state(JobState::Failed);
            self.store.put_job(&record)?;
        }
        self.release(job_id, reserved).await
    }

    /// Return reserved capacity and advance to `Released`. Idempotent:
    /// a record already released is left untouched, and the registry
    /// itself caps availability at each node's total.
    ///
    /// `reserved` is the driver's in-memory copy of the committed
    /// reservation; it backs the record up when the write that was meant
    /// to persist the allocations failed, so the capacity still comes
    /// back.
    async fn release(&self, job_id: &str, reserved: &[Allocation]) -> SchedulerResult<()> {
        let mut record = self.load(job_id)?;
        if record.state == JobState::Released {
            return Ok(());
        }
        if record.allocations.is_empty() && !reserved.is_empty() {
            warn!(%job_id, "allocations missing from record, releasing from driver copy");
            record.allocations = reserved.to_vec();
        }
        if !record.allocations.is_empty() {
            self.registry.release(&record.allocations).await?;
        }
        record.set_state(JobState::Released);
        self.store.put_job(&record)?;
        debug!(%job_id, "capacity released");
        Ok(())
    }

    fn transition(&self, job_id: &str, state: JobState) -> SchedulerResult<()> {
        let mut record = self.load(job_id)?;
        record.set_state(state);
        self.store.put_job(&record)?;
        debug!(%job_id, state = ?state, "state transition");
        Ok(())
    }

    fn update(
        &self,
        job_id: &str,
        mutate: impl FnOnce(&mut JobRecord),
    ) -> SchedulerResult<()> {
        let mut record = self.load(job_id)?;
        mutate(&mut record);
        record.updated_at = freshet_state::epoch_secs();
        self.store.put_job(&record)?;
        Ok(())
    }

    fn load(&self, job_id: &str) -> SchedulerResult<JobRecord> {
        self.store
            .get_job(job_id)?
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))
    }
}

/// Cooperative cancellation checkpoint between pipeline steps.
fn checkpoint(cancel: &CancellationToken) -> SchedulerResult<()> {
    if cancel.is_cancelled() {
        Err(SchedulerError::Cancelled)
    } else {
        Ok(())
    }
}
