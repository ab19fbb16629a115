//! StateStore — redb-backed persistence for nodes and jobs.
//!
//! Provides typed CRUD operations over the node inventory and job records.
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::{JOBS, NODES};
use crate::types::{JobRecord, NodeId, ResourceNode};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(JOBS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a node.
    pub fn put_node(&self, node: &ResourceNode) -> StateResult<()> {
        let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            table
                .insert(node.id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a node by id.
    pub fn get_node(&self, node_id: NodeId) -> StateResult<Option<ResourceNode>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(node_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let node: ResourceNode =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// List all nodes in ascending id order (the table key order).
    pub fn list_nodes(&self) -> StateResult<Vec<ResourceNode>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let node: ResourceNode =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(node);
        }
        Ok(results)
    }

    /// Replace the availability of several nodes in one transaction.
    ///
    /// Used by the registry to commit a reservation or release as a single
    /// atomic step. Fails without committing if any node is missing.
    pub fn put_nodes(&self, nodes: &[ResourceNode]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            for node in nodes {
                let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
                table
                    .insert(node.id, value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Delete a node by id. Returns true if it existed.
    pub fn delete_node(&self, node_id: NodeId) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            existed = table.remove(node_id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(node_id, existed, "node deleted");
        Ok(existed)
    }

    // ── Jobs ───────────────────────────────────────────────────────

    /// Insert or update a job record.
    pub fn put_job(&self, job: &JobRecord) -> StateResult<()> {
        let value = serde_json::to_vec(job).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(JOBS).map_err(map_err!(Table))?;
            table
                .insert(job.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a job by id.
    pub fn get_job(&self, job_id: &str) -> StateResult<Option<JobRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(JOBS).map_err(map_err!(Table))?;
        match table.get(job_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let job: JobRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// List all job records.
    pub fn list_jobs(&self) -> StateResult<Vec<JobRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(JOBS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let job: JobRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(job);
        }
        Ok(results)
    }

    /// Delete a job by id. Returns true if it existed.
    pub fn delete_job(&self, job_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(JOBS).map_err(map_err!(Table))?;
            existed = table.remove(job_id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%job_id, existed, "job deleted");
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Allocation, AllocationParadigm, JobState, ModelRequest};

    fn test_request() -> ModelRequest {
        ModelRequest {
            cpu_count: 4,
            paradigm: AllocationParadigm::SingleNode,
            hydrofabric_id: "hf-1".to_string(),
            forcings_id: "forc-1".to_string(),
            realization_config_id: "real-1".to_string(),
            partition_config_id: None,
        }
    }

    // ── Node CRUD ──────────────────────────────────────────────────

    #[test]
    fn node_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let node = ResourceNode::new(1, "compute-01", 8);

        store.put_node(&node).unwrap();
        let retrieved = store.get_node(1).unwrap();

        assert_eq!(retrieved, Some(node));
    }

    #[test]
    fn node_get_nonexistent_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_node(42).unwrap().is_none());
    }

    #[test]
    fn node_list_is_ascending_id_order() {
        let store = StateStore::open_in_memory().unwrap();
        // Insert out of order on purpose.
        store.put_node(&ResourceNode::new(3, "compute-03", 8)).unwrap();
        store.put_node(&ResourceNode::new(1, "compute-01", 4)).unwrap();
        store.put_node(&ResourceNode::new(2, "compute-02", 4)).unwrap();

        let ids: Vec<u32> = store.list_nodes().unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn node_bulk_update_is_atomic_snapshot() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_node(&ResourceNode::new(1, "compute-01", 8)).unwrap();
        store.put_node(&ResourceNode::new(2, "compute-02", 8)).unwrap();

        let mut nodes = store.list_nodes().unwrap();
        for node in &mut nodes {
            node.available_cpus -= 2;
        }
        store.put_nodes(&nodes).unwrap();

        let reread = store.list_nodes().unwrap();
        assert!(reread.iter().all(|n| n.available_cpus == 6));
    }

    #[test]
    fn node_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_node(&ResourceNode::new(1, "compute-01", 8)).unwrap();

        assert!(store.delete_node(1).unwrap());
        assert!(!store.delete_node(1).unwrap());
        assert!(store.get_node(1).unwrap().is_none());
    }

    // ── Job CRUD ───────────────────────────────────────────────────

    #[test]
    fn job_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let job = JobRecord::new("job-a", test_request());

        store.put_job(&job).unwrap();
        let retrieved = store.get_job("job-a").unwrap();

        assert_eq!(retrieved, Some(job));
    }

    #[test]
    fn job_update_in_place() {
        let store = StateStore::open_in_memory().unwrap();
        let mut job = JobRecord::new("job-a", test_request());
        store.put_job(&job).unwrap();

        job.set_state(JobState::Allocating);
        job.allocations = vec![Allocation { node_id: 1, cpu_count: 4 }];
        store.put_job(&job).unwrap();

        let retrieved = store.get_job("job-a").unwrap().unwrap();
        assert_eq!(retrieved.state, JobState::Allocating);
        assert_eq!(retrieved.allocations.len(), 1);
    }

    #[test]
    fn job_list_all() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_job(&JobRecord::new("job-a", test_request())).unwrap();
        store.put_job(&JobRecord::new("job-b", test_request())).unwrap();

        assert_eq!(store.list_jobs().unwrap().len(), 2);
    }

    #[test]
    fn job_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_job(&JobRecord::new("job-a", test_request())).unwrap();

        assert!(store.delete_job("job-a").unwrap());
        assert!(store.get_job("job-a").unwrap().is_none());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put_node(&ResourceNode::new(7, "compute-07", 32)).unwrap();
            store.put_job(&JobRecord::new("job-a", test_request())).unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        assert_eq!(store.get_node(7).unwrap().unwrap().hostname, "compute-07");
        assert!(store.get_job("job-a").unwrap().is_some());
    }

    // ── Edge cases ─────────────────────────────────────────────────

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_nodes().unwrap().is_empty());
        assert!(store.list_jobs().unwrap().is_empty());
        assert!(!store.delete_node(1).unwrap());
        assert!(!store.delete_job("nope").unwrap());
    }
}
