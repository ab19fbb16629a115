//! MPI process group launch and supervision.
//!
//! The launcher starts `mpirun` against the readiness-checked hostfile with
//! a process count equal to the hostfile's total, then waits for natural
//! completion — there is no timeout on the model run itself, only explicit
//! cancellation. The exit status and a stderr tail are captured for the
//! job record.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{LaunchError, LaunchResult};

/// How many trailing stderr lines are kept as the failure diagnostic.
const STDERR_TAIL_LINES: usize = 20;

/// Everything needed to start one distributed run.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub job_id: String,
    /// Path to the written hostfile inside the job's scratch directory.
    pub hostfile: PathBuf,
    /// Sum of the hostfile's CPU counts.
    pub total_processes: u32,
    /// The model executable and its arguments.
    pub program: String,
    pub args: Vec<String>,
}

/// Captured outcome of a supervised run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Exit code if the process group exited normally.
    pub exit_code: Option<i32>,
    /// Trailing stderr lines, for the job's failure diagnostic.
    pub stderr_tail: String,
    /// Whether the run was torn down by cancellation.
    pub cancelled: bool,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        !self.cancelled && self.exit_code == Some(0)
    }

    /// Human-readable diagnostic for failed runs.
    pub fn diagnostic(&self) -> String {
        if self.cancelled {
            return "cancelled".to_string();
        }
        match (self.exit_code, self.stderr_tail.is_empty()) {
            (Some(code), true) => format!("exit code {code}"),
            (Some(code), false) => format!("exit code {code}: {}", self.stderr_tail),
            (None, _) => format!("killed by signal: {}", self.stderr_tail),
        }
    }
}

/// Starts and supervises a distributed run to completion.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    async fn run(&self, spec: &LaunchSpec, cancel: CancellationToken) -> LaunchResult<RunOutcome>;
}

/// `mpirun`-based launcher.
pub struct MpiLauncher {
    mpi_command: String,
    /// Extra arguments placed before the hostfile/process-count pair.
    mpi_args: Vec<String>,
}

impl MpiLauncher {
    pub fn new(mpi_command: impl Into<String>) -> Self {
        Self {
            mpi_command: mpi_command.into(),
            mpi_args: Vec::new(),
        }
    }

    /// Prepend fixed arguments to every invocation (e.g. `--bind-to core`).
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.mpi_args = args.into_iter().collect();
        self
    }

    /// The full argument vector for one launch.
    fn command_line(&self, spec: &LaunchSpec) -> Vec<String> {
        let mut argv = self.mpi_args.clone();
        argv.push("-f".to_string());
        argv.push(spec.hostfile.display().to_string());
        argv.push("-n".to_string());
        argv.push(spec.total_processes.to_string());
        argv.push(spec.program.clone());
        argv.extend(spec.args.iter().cloned());
        argv
    }
}

#[async_trait]
impl JobLauncher for MpiLauncher {
    async fn run(&self, spec: &LaunchSpec, cancel: CancellationToken) -> LaunchResult<RunOutcome> {
        let argv = self.command_line(spec);
        info!(
            job_id = %spec.job_id,
            command = %self.mpi_command,
            processes = spec.total_processes,
            "starting process group"
        );

        let mut child = tokio::process::Command::new(&self.mpi_command)
            .args(&argv)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(LaunchError::Spawn)?;

        // Drain stderr concurrently so a chatty run can't fill the pipe.
        let stderr = child.stderr.take();
        let tail_task = tokio::spawn(async move {
            let mut tail = std::collections::VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let (status, cancelled) = tokio::select! {
            status = child.wait() => (status.map_err(LaunchError::Wait)?, false),
            () = cancel.cancelled() => {
                warn!(job_id = %spec.job_id, "terminating process group on cancellation");
                let _ = child.start_kill();
                (child.wait().await.map_err(LaunchError::Wait)?, true)
            }
        };

        let stderr_tail = tail_task.await.unwrap_or_default();
        let outcome = RunOutcome {
            exit_code: status.code(),
            stderr_tail,
            cancelled,
        };
        info!(
            job_id = %spec.job_id,
            exit_code = ?outcome.exit_code,
            cancelled,
            "process group exited"
        );
        Ok(outcome)
    }
}
