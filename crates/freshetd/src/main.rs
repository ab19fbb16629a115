//! freshetd — the Freshet daemon.
//!
//! Single binary that assembles the scheduling engine for distributed
//! hydrological model runs:
//! - State store (redb)
//! - Node registry, loaded from a static TOML inventory
//! - Partitioner service client
//! - Hostfile builder + MPI launcher
//! - Scheduler
//! - REST gateway
//!
//! # Usage
//!
//! ```text
//! freshetd serve --port 8000 --nodes /etc/freshet/nodes.toml \
//!     --data-dir /var/lib/freshet --partitioner-address partitioner:5000
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use freshet_launch::{ClusterOrchestrator, HostfileBuilder, MpiLauncher, SwarmOrchestrator, TcpProbe};
use freshet_partition::HttpPartitioner;
use freshet_registry::ResourceRegistry;
use freshet_scheduler::{Scheduler, SchedulerConfig};
use freshet_state::StateStore;
use freshetd::{InventoryConfig, build_router};

#[derive(Parser)]
#[command(name = "freshetd", about = "Freshet scheduling daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway, registry, and scheduler in one process.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8000")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/freshet")]
        data_dir: PathBuf,

        /// Node inventory file.
        #[arg(long, default_value = "/etc/freshet/nodes.toml")]
        nodes: PathBuf,

        /// Base directory for per-job scratch directories.
        #[arg(long, default_value = "/var/lib/freshet/jobs")]
        scratch_dir: PathBuf,

        /// Directory holding model datasets; when set, each job's datasets
        /// are linked into its scratch directory.
        #[arg(long)]
        dataset_dir: Option<PathBuf>,

        /// host:port of the partitioner service.
        #[arg(long, default_value = "partitioner:5000")]
        partitioner_address: String,

        /// Request path on the partitioner service.
        #[arg(long, default_value = "/partition")]
        partitioner_path: String,

        /// Per-request partitioning deadline in seconds.
        #[arg(long, default_value = "300")]
        partitioner_timeout: u64,

        /// MPI launch command.
        #[arg(long, default_value = "mpirun")]
        mpi_command: String,

        /// Model executable handed to the launcher.
        #[arg(long, default_value = "ngen")]
        model_program: String,

        /// Worker service name prefix in the container scheduler.
        #[arg(long, default_value = "freshet-worker")]
        service_prefix: String,

        /// TCP port probed for node readiness.
        #[arg(long, default_value = "22")]
        probe_port: u16,

        /// Overall readiness deadline per launch, in seconds.
        #[arg(long, default_value = "120")]
        readiness_deadline: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,freshetd=debug,freshet=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            data_dir,
            nodes,
            scratch_dir,
            dataset_dir,
            partitioner_address,
            partitioner_path,
            partitioner_timeout,
            mpi_command,
            model_program,
            service_prefix,
            probe_port,
            readiness_deadline,
        } => {
            info!("Freshet daemon starting");

            std::fs::create_dir_all(&data_dir)?;
            std::fs::create_dir_all(&scratch_dir)?;
            let db_path = data_dir.join("freshet.redb");

            // ── Initialize subsystems ──────────────────────────────

            let store = StateStore::open(&db_path)?;
            info!(path = ?db_path, "state store opened");

            let inventory = InventoryConfig::from_file(&nodes)?;
            let registry = Arc::new(ResourceRegistry::new(store.clone()));
            let cluster_nodes = inventory.nodes();
            for node in &cluster_nodes {
                registry.register_node(node.clone()).await?;
            }
            info!(nodes = cluster_nodes.len(), "node inventory registered");

            let orchestrator = Arc::new(SwarmOrchestrator::new(service_prefix));
            // One worker replica per inventory node. Scaling is retried on
            // the next restart, so a cold container scheduler only warns.
            if let Err(e) = orchestrator
                .scale_workers(cluster_nodes.len() as u32)
                .await
            {
                warn!(error = %e, "worker pool scaling failed");
            }

            let partitioner = Arc::new(HttpPartitioner::new(
                partitioner_address,
                partitioner_path,
                Duration::from_secs(partitioner_timeout),
            ));

            let hostfiles = Arc::new(HostfileBuilder::new(
                Arc::new(TcpProbe::new(probe_port, Duration::from_secs(2))),
                Duration::from_secs(5),
                Duration::from_secs(readiness_deadline),
            ));

            let launcher = Arc::new(MpiLauncher::new(mpi_command));

            let scheduler = Arc::new(Scheduler::new(
                store,
                registry.clone(),
                partitioner,
                hostfiles,
                launcher,
                orchestrator,
                SchedulerConfig {
                    scratch_base: scratch_dir,
                    dataset_base: dataset_dir,
                    model_program,
                },
            ));
            info!("scheduler initialized");

            // ── Start API server ───────────────────────────────────

            let router = build_router(scheduler, registry);
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            info!(%addr, "API server starting");

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "failed to install CTRL+C handler");
                        return;
                    }
                    info!("shutdown signal received");
                })
                .await?;

            info!("Freshet daemon stopped");
            Ok(())
        }
    }
}
