//! ResourceRegistry — snapshot, reserve, and release of node capacity.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use freshet_state::{Allocation, NodeId, ResourceNode, StateResult, StateStore};

use crate::error::{RegistryError, RegistryResult};

/// How many times a failing store operation is attempted before giving up.
const STORE_ATTEMPTS: u32 = 3;
/// Base delay for the exponential backoff between attempts.
const STORE_BACKOFF_BASE: Duration = Duration::from_millis(50);

/// Tracks cluster compute nodes and their CPU capacity.
///
/// The registry is the sole writer of `available_cpus`. Reserve and release
/// each read, validate, and commit under one internal mutex, so concurrent
/// callers serialize here and a failed validation commits nothing.
pub struct ResourceRegistry {
    store: StateStore,
    commit_lock: Mutex<()>,
}

impl ResourceRegistry {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            commit_lock: Mutex::new(()),
        }
    }

    /// Register a node, or refresh its capacity if already known.
    ///
    /// Re-registering preserves in-flight reservations: the available count
    /// is shifted by the change in total capacity and clamped to the new
    /// total, rather than reset.
    pub async fn register_node(&self, node: ResourceNode) -> RegistryResult<()> {
        let _guard = self.commit_lock.lock().await;
        let existing = with_retries(|| self.store.get_node(node.id)).await?;
        let merged = match existing {
            Some(prev) => {
                let reserved = prev.total_cpus.saturating_sub(prev.available_cpus);
                ResourceNode {
                    available_cpus: node.total_cpus.saturating_sub(reserved),
                    ..node
                }
            }
            None => node,
        };
        info!(
            node_id = merged.id,
            hostname = %merged.hostname,
            total = merged.total_cpus,
            available = merged.available_cpus,
            "node registered"
        );
        with_retries(|| self.store.put_node(&merged)).await
    }

    /// Remove a node from the inventory. Returns true if it existed.
    pub async fn remove_node(&self, node_id: NodeId) -> RegistryResult<bool> {
        let _guard = self.commit_lock.lock().await;
        with_retries(|| self.store.delete_node(node_id)).await
    }

    /// Current capacity snapshot, in ascending node id order.
    pub async fn snapshot(&self) -> RegistryResult<Vec<ResourceNode>> {
        with_retries(|| self.store.list_nodes()).await
    }

    /// Atomically commit a reservation.
    ///
    /// Every allocation is validated against current availability before
    /// anything is written; on conflict the registry is left untouched, so
    /// callers working from a stale snapshot see a clean failure instead of
    /// oversubscription.
    pub async fn try_reserve(&self, allocations: &[Allocation]) -> RegistryResult<()> {
        let _guard = self.commit_lock.lock().await;
        let mut nodes = with_retries(|| self.store.list_nodes()).await?;

        let mut touched = Vec::with_capacity(allocations.len());
        for alloc in allocations {
            let node = nodes
                .iter_mut()
                .find(|n| n.id == alloc.node_id)
                .ok_or(RegistryError::UnknownNode(alloc.node_id))?;
            if node.available_cpus < alloc.cpu_count {
                return Err(RegistryError::ReserveConflict {
                    node_id: node.id,
                    requested: alloc.cpu_count,
                    available: node.available_cpus,
                });
            }
            node.available_cpus -= alloc.cpu_count;
            touched.push(node.clone());
        }

        with_retries(|| self.store.put_nodes(&touched)).await?;
        debug!(nodes = touched.len(), "reservation committed");
        Ok(())
    }

    /// Return reserved capacity to the pool.
    ///
    /// Availability is capped at each node's total, so releasing the same
    /// allocations twice can never inflate capacity. Nodes that have left
    /// the inventory since the reservation are skipped with a warning.
    pub async fn release(&self, allocations: &[Allocation]) -> RegistryResult<()> {
        let _guard = self.commit_lock.lock().await;
        let mut nodes = with_retries(|| self.store.list_nodes()).await?;

        let mut touched = Vec::with_capacity(allocations.len());
        for alloc in allocations {
            match nodes.iter_mut().find(|n| n.id == alloc.node_id) {
                Some(node) => {
                    node.available_cpus =
                        (node.available_cpus + alloc.cpu_count).min(node.total_cpus);
                    touched.push(node.clone());
                }
                None => {
                    warn!(node_id = alloc.node_id, "released node no longer in inventory");
                }
            }
        }

        if !touched.is_empty() {
            with_retries(|| self.store.put_nodes(&touched)).await?;
        }
        debug!(nodes = touched.len(), "release committed");
        Ok(())
    }
}

/// Run a store operation with bounded exponential backoff.
async fn with_retries<T>(op: impl Fn() -> StateResult<T>) -> RegistryResult<T> {
    let mut delay = STORE_BACKOFF_BASE;
    let mut last_error = String::new();
    for attempt in 1..=STORE_ATTEMPTS {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(attempt, error = %e, "state store operation failed");
                last_error = e.to_string();
                if attempt < STORE_ATTEMPTS {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
    Err(RegistryError::StoreUnavailable {
        attempts: STORE_ATTEMPTS,
        last_error,
    })
}
