//! Hostfile assembly, gated on node readiness.
//!
//! The distributed launcher consumes one `"<hostname>:<cpu_count>"` line
//! per allocation, in the order the allocator produced them; the total
//! process count is the sum of all listed counts. Before a hostfile is
//! handed out, every target host must pass a readiness probe with bounded
//! retries inside an overall deadline — never an unconditional poll.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{LaunchError, LaunchResult};
use crate::probe::ReadinessProbe;

/// One granted host with its CPU share, in allocation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub hostname: String,
    pub cpu_count: u32,
}

/// An ordered, readiness-checked host list for the distributed launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hostfile {
    entries: Vec<HostEntry>,
}

impl Hostfile {
    /// The `host:cpus` lines, allocation order preserved.
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("{}:{}", e.hostname, e.cpu_count))
            .collect()
    }

    /// Total MPI process count across all listed hosts.
    pub fn total_processes(&self) -> u32 {
        self.entries.iter().map(|e| e.cpu_count).sum()
    }

    pub fn entries(&self) -> &[HostEntry] {
        &self.entries
    }

    /// Write the hostfile to disk, one line per host.
    pub fn write_to(&self, path: &Path) -> LaunchResult<()> {
        let mut content = self.lines().join("\n");
        content.push('\n');
        std::fs::write(path, content).map_err(LaunchError::Scratch)
    }
}

/// Builds hostfiles after gating every target host on readiness.
pub struct HostfileBuilder {
    probe: Arc<dyn ReadinessProbe>,
    /// Pause between probe attempts against a host.
    retry_interval: Duration,
    /// Overall budget shared by all hosts of one build.
    deadline: Duration,
}

impl HostfileBuilder {
    pub fn new(probe: Arc<dyn ReadinessProbe>, retry_interval: Duration, deadline: Duration) -> Self {
        Self {
            probe,
            retry_interval,
            deadline,
        }
    }

    /// Probe every host and emit the hostfile.
    ///
    /// Hosts are checked in allocation order; a host that never becomes
    /// ready before the overall deadline fails the build with
    /// [`LaunchError::HostUnreachable`] naming it, and no hostfile is
    /// returned. Time spent on earlier hosts counts against the budget.
    pub async fn build(&self, entries: Vec<HostEntry>) -> LaunchResult<Hostfile> {
        let deadline = Instant::now() + self.deadline;

        for entry in &entries {
            let mut attempts = 0u32;
            loop {
                attempts += 1;
                if self.probe.is_ready(&entry.hostname).await {
                    debug!(host = %entry.hostname, attempts, "host ready");
                    break;
                }
                if Instant::now() + self.retry_interval >= deadline {
                    warn!(host = %entry.hostname, attempts, "host never became ready");
                    return Err(LaunchError::HostUnreachable {
                        host: entry.hostname.clone(),
                    });
                }
                tokio::time::sleep(self.retry_interval).await;
            }
        }

        let hostfile = Hostfile { entries };
        info!(
            hosts = hostfile.entries.len(),
            processes = hostfile.total_processes(),
            "hostfile ready"
        );
        Ok(hostfile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Probe fake: a host is ready unless listed as dead; attempts are
    /// recorded for retry assertions.
    struct FakeProbe {
        dead: HashSet<String>,
        attempts: Mutex<Vec<String>>,
    }

    impl FakeProbe {
        fn all_ready() -> Self {
            Self::with_dead(&[])
        }

        fn with_dead(dead: &[&str]) -> Self {
            Self {
                dead: dead.iter().map(|s| s.to_string()).collect(),
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReadinessProbe for FakeProbe {
        async fn is_ready(&self, hostname: &str) -> bool {
            self.attempts.lock().unwrap().push(hostname.to_string());
            !self.dead.contains(hostname)
        }
    }

    fn entries() -> Vec<HostEntry> {
        vec![
            HostEntry { hostname: "compute-01".to_string(), cpu_count: 4 },
            HostEntry { hostname: "compute-02".to_string(), cpu_count: 2 },
        ]
    }

    fn builder(probe: Arc<dyn ReadinessProbe>) -> HostfileBuilder {
        HostfileBuilder::new(probe, Duration::from_millis(10), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn lines_preserve_allocation_order_and_format() {
        let hostfile = builder(Arc::new(FakeProbe::all_ready()))
            .build(entries())
            .await
            .unwrap();

        assert_eq!(hostfile.lines(), vec!["compute-01:4", "compute-02:2"]);
        assert_eq!(hostfile.total_processes(), 6);
    }

    #[tokio::test]
    async fn unready_host_fails_the_build_by_name() {
        let result = builder(Arc::new(FakeProbe::with_dead(&["compute-02"])))
            .build(entries())
            .await;

        match result {
            Err(LaunchError::HostUnreachable { host }) => assert_eq!(host, "compute-02"),
            other => panic!("expected HostUnreachable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dead_host_is_retried_until_the_deadline() {
        let probe = Arc::new(FakeProbe::with_dead(&["compute-01"]));
        let result = builder(probe.clone()).build(entries()).await;

        assert!(result.is_err());
        // 200ms budget at 10ms intervals: several attempts, all on the
        // first host, none on the second.
        let attempts = probe.attempts.lock().unwrap();
        assert!(attempts.len() > 3);
        assert!(attempts.iter().all(|h| h == "compute-01"));
    }

    #[tokio::test]
    async fn write_to_emits_one_line_per_host() {
        let hostfile = builder(Arc::new(FakeProbe::all_ready()))
            .build(entries())
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostfile");
        hostfile.write_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "compute-01:4\ncompute-02:2\n");
    }

    #[tokio::test]
    async fn empty_entry_list_builds_trivially() {
        let hostfile = builder(Arc::new(FakeProbe::all_ready()))
            .build(Vec::new())
            .await
            .unwrap();
        assert!(hostfile.lines().is_empty());
        assert_eq!(hostfile.total_processes(), 0);
    }
}
