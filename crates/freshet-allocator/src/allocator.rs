//! Allocation algorithms for the three paradigms.
//!
//! All three are all-or-nothing: on failure no partial result escapes, so
//! the caller never has anything to roll back.

use tracing::debug;

use freshet_state::{Allocation, AllocationParadigm, ResourceNode};

use crate::error::{AllocError, AllocResult};

/// Compute node/CPU assignments for a request against a capacity snapshot.
///
/// The snapshot is taken as-is; nodes are re-sorted by ascending id before
/// traversal so callers may pass an unordered slice. Returned allocations
/// always sum to exactly `requested_cpus` and reference distinct nodes.
pub fn allocate(
    requested_cpus: u32,
    paradigm: AllocationParadigm,
    nodes: &[ResourceNode],
) -> AllocResult<Vec<Allocation>> {
    if requested_cpus == 0 {
        return Err(AllocError::ZeroCpusRequested);
    }

    let mut ordered: Vec<&ResourceNode> = nodes.iter().collect();
    ordered.sort_by_key(|n| n.id);

    let allocations = match paradigm {
        AllocationParadigm::SingleNode => single_node(requested_cpus, &ordered)?,
        AllocationParadigm::FillNodes => fill_nodes(requested_cpus, &ordered)?,
        AllocationParadigm::RoundRobin => round_robin(requested_cpus, &ordered)?,
    };

    debug!(
        requested = requested_cpus,
        ?paradigm,
        nodes_touched = allocations.len(),
        "allocation computed"
    );
    Ok(allocations)
}

/// First node that can hold the entire request; no splitting permitted.
fn single_node(requested: u32, ordered: &[&ResourceNode]) -> AllocResult<Vec<Allocation>> {
    for node in ordered {
        if node.available_cpus >= requested {
            return Ok(vec![Allocation {
                node_id: node.id,
                cpu_count: requested,
            }]);
        }
    }
    // Aggregate capacity is irrelevant here: the request must fit whole.
    let best = ordered.iter().map(|n| n.available_cpus).max().unwrap_or(0);
    Err(AllocError::InsufficientCapacity {
        requested,
        available: best,
    })
}

/// Drain each node in id order before touching the next; at most one
/// allocation record per node, full or partial.
fn fill_nodes(requested: u32, ordered: &[&ResourceNode]) -> AllocResult<Vec<Allocation>> {
    let mut remaining = requested;
    let mut allocations = Vec::new();

    for node in ordered {
        if remaining == 0 {
            break;
        }
        let take = node.available_cpus.min(remaining);
        if take > 0 {
            allocations.push(Allocation {
                node_id: node.id,
                cpu_count: take,
            });
            remaining -= take;
        }
    }

    if remaining > 0 {
        return Err(AllocError::InsufficientCapacity {
            requested,
            available: requested - remaining,
        });
    }
    Ok(allocations)
}

/// One CPU per node per pass, cycling nodes with capacity left, until the
/// request is satisfied. Passes are summed into a single record per node,
/// emitted in node id order.
fn round_robin(requested: u32, ordered: &[&ResourceNode]) -> AllocResult<Vec<Allocation>> {
    let total_available: u32 = ordered.iter().map(|n| n.available_cpus).sum();
    if total_available < requested {
        return Err(AllocError::InsufficientCapacity {
            requested,
            available: total_available,
        });
    }

    let mut granted = vec![0u32; ordered.len()];
    let mut remaining = requested;
    // Terminates because total availability covers the request.
    while remaining > 0 {
        for (taken, node) in granted.iter_mut().zip(ordered) {
            if remaining == 0 {
                break;
            }
            if *taken < node.available_cpus {
                *taken += 1;
                remaining -= 1;
            }
        }
    }

    Ok(granted
        .iter()
        .zip(ordered)
        .filter(|(taken, _)| **taken > 0)
        .map(|(taken, node)| Allocation {
            node_id: node.id,
            cpu_count: *taken,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The reference cluster from the scheduling scenarios: 4 + 4 + 8 CPUs.
    fn cluster() -> Vec<ResourceNode> {
        vec![
            ResourceNode::new(1, "compute-01", 4),
            ResourceNode::new(2, "compute-02", 4),
            ResourceNode::new(3, "compute-03", 8),
        ]
    }

    fn alloc(node_id: u32, cpu_count: u32) -> Allocation {
        Allocation { node_id, cpu_count }
    }

    #[test]
    fn zero_request_is_rejected() {
        for paradigm in [
            AllocationParadigm::FillNodes,
            AllocationParadigm::RoundRobin,
            AllocationParadigm::SingleNode,
        ] {
            let result = allocate(0, paradigm, &cluster());
            assert_eq!(result, Err(AllocError::ZeroCpusRequested));
        }
    }

    #[test]
    fn single_node_uses_first_node_that_fits_whole() {
        // Request 6: nodes 1 and 2 are too small, node 3 fits it entirely.
        let result = allocate(6, AllocationParadigm::SingleNode, &cluster()).unwrap();
        assert_eq!(result, vec![alloc(3, 6)]);
    }

    #[test]
    fn single_node_never_splits_even_when_aggregate_suffices() {
        // 10 fits in 4+4+8 aggregate but on no single node.
        let result = allocate(10, AllocationParadigm::SingleNode, &cluster());
        assert_eq!(
            result,
            Err(AllocError::InsufficientCapacity {
                requested: 10,
                available: 8,
            })
        );
    }

    #[test]
    fn single_node_prefers_lowest_id() {
        let result = allocate(3, AllocationParadigm::SingleNode, &cluster()).unwrap();
        assert_eq!(result, vec![alloc(1, 3)]);
    }

    #[test]
    fn fill_nodes_drains_in_id_order() {
        // 6 = all of node 1 (4) plus a remainder of 2 from node 2.
        let result = allocate(6, AllocationParadigm::FillNodes, &cluster()).unwrap();
        assert_eq!(result, vec![alloc(1, 4), alloc(2, 2)]);
    }

    #[test]
    fn fill_nodes_sums_to_request() {
        for request in 1..=16 {
            let result = allocate(request, AllocationParadigm::FillNodes, &cluster()).unwrap();
            let total: u32 = result.iter().map(|a| a.cpu_count).sum();
            assert_eq!(total, request);
        }
    }

    #[test]
    fn round_robin_one_cpu_per_node_per_pass() {
        // Two passes over three nodes: 2 CPUs each.
        let result = allocate(6, AllocationParadigm::RoundRobin, &cluster()).unwrap();
        assert_eq!(result, vec![alloc(1, 2), alloc(2, 2), alloc(3, 2)]);
    }

    #[test]
    fn round_robin_overflow_lands_on_deeper_nodes() {
        // 14 of 16: nodes 1 and 2 cap at 4, node 3 absorbs the rest.
        let result = allocate(14, AllocationParadigm::RoundRobin, &cluster()).unwrap();
        assert_eq!(result, vec![alloc(1, 4), alloc(2, 4), alloc(3, 6)]);
        let total: u32 = result.iter().map(|a| a.cpu_count).sum();
        assert_eq!(total, 14);
    }

    #[test]
    fn round_robin_sums_to_request() {
        for request in 1..=16 {
            let result = allocate(request, AllocationParadigm::RoundRobin, &cluster()).unwrap();
            let total: u32 = result.iter().map(|a| a.cpu_count).sum();
            assert_eq!(total, request);
        }
    }

    #[test]
    fn all_paradigms_fail_beyond_cluster_capacity() {
        // 20 of 16 total.
        for paradigm in [
            AllocationParadigm::FillNodes,
            AllocationParadigm::RoundRobin,
            AllocationParadigm::SingleNode,
        ] {
            let result = allocate(20, paradigm, &cluster());
            assert!(
                matches!(result, Err(AllocError::InsufficientCapacity { .. })),
                "{paradigm:?} should fail"
            );
        }
    }

    #[test]
    fn never_exceeds_any_node_availability() {
        let mut nodes = cluster();
        nodes[0].available_cpus = 1; // Partially consumed node.
        for paradigm in [AllocationParadigm::FillNodes, AllocationParadigm::RoundRobin] {
            let result = allocate(9, paradigm, &nodes).unwrap();
            for a in &result {
                let node = nodes.iter().find(|n| n.id == a.node_id).unwrap();
                assert!(a.cpu_count <= node.available_cpus);
            }
        }
    }

    #[test]
    fn nodes_with_zero_availability_are_skipped() {
        let mut nodes = cluster();
        nodes[1].available_cpus = 0;
        let result = allocate(6, AllocationParadigm::FillNodes, &nodes).unwrap();
        assert_eq!(result, vec![alloc(1, 4), alloc(3, 2)]);

        let result = allocate(6, AllocationParadigm::RoundRobin, &nodes).unwrap();
        assert_eq!(result, vec![alloc(1, 3), alloc(3, 3)]);
    }

    #[test]
    fn unsorted_snapshot_is_traversed_by_ascending_id() {
        let nodes = vec![
            ResourceNode::new(3, "compute-03", 8),
            ResourceNode::new(1, "compute-01", 4),
            ResourceNode::new(2, "compute-02", 4),
        ];
        let result = allocate(6, AllocationParadigm::FillNodes, &nodes).unwrap();
        assert_eq!(result, vec![alloc(1, 4), alloc(2, 2)]);
    }

    #[test]
    fn allocations_reference_distinct_nodes() {
        for paradigm in [AllocationParadigm::FillNodes, AllocationParadigm::RoundRobin] {
            let result = allocate(16, paradigm, &cluster()).unwrap();
            let mut ids: Vec<u32> = result.iter().map(|a| a.node_id).collect();
            ids.dedup();
            assert_eq!(ids.len(), result.len());
        }
    }

    #[test]
    fn empty_snapshot_fails_cleanly() {
        for paradigm in [
            AllocationParadigm::FillNodes,
            AllocationParadigm::RoundRobin,
            AllocationParadigm::SingleNode,
        ] {
            let result = allocate(1, paradigm, &[]);
            assert!(matches!(result, Err(AllocError::InsufficientCapacity { .. })));
        }
    }
}
