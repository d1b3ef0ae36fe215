/*
* Memory Placement Balancer
* -------------------------
*
* Greedy longest-processing-time-first spread of workloads over a host pool.
*
* 1. Templates are dropped, they never move.
* 2. Workloads are stably sorted by configured memory, largest first.
* 3. Every host gets a PlacementQueue whose weight starts at the host's
*    *installed* memory (not free memory).
* 4. Each workload goes to the queue with the most weight left, ties going
*    to the host that was supplied first, and its footprint is subtracted.
*
* It is an approximation, not an optimal partition, and it does not look at
* where a workload currently runs, so it can schedule moves that change
* nothing on paper.
*/

use serde::Serialize;
use tracing::debug;

use crate::core::{Host, Workload};
use crate::errors::{ManagerError, ManagerResult};

/// Per-host accumulator for one balancing run.
#[derive(Debug, Clone, Serialize)]
pub struct PlacementQueue {
    pub host: Host,
    pub weight: i64,
    pub workloads: Vec<Workload>,
}

impl PlacementQueue {
    pub fn new(host: Host) -> Self {
        Self {
            weight: clamp_bytes(host.memory_bytes),
            host,
            workloads: Vec::new(),
        }
    }

    pub fn host_name(&self) -> &str {
        &self.host.name
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }

    /// Sum of the footprints queued on this host.
    pub fn assigned_bytes(&self) -> u64 {
        self.workloads
            .iter()
            .map(Workload::footprint_bytes)
            .fold(0, u64::saturating_add)
    }

    fn push(&mut self, workload: Workload) {
        // pins at i64::MIN, never wraps
        self.weight = self.weight.saturating_sub(clamp_bytes(workload.footprint_bytes()));
        self.workloads.push(workload);
    }
}

fn clamp_bytes(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

/// Assign `workloads` to `hosts`, returning one queue per host in supply order.
pub fn balance(hosts: &[Host], workloads: &[Workload]) -> ManagerResult<Vec<PlacementQueue>> {
    if hosts.is_empty() {
        return Err(ManagerError::InvalidInput(
            "no hosts supplied to balance across".to_string(),
        ));
    }

    let mut candidates: Vec<&Workload> = workloads.iter().filter(|w| !w.template).collect();
    // sort_by is stable, equal footprints keep input order
    candidates.sort_by(|a, b| b.memory_mb.cmp(&a.memory_mb));

    debug!(
        vms = candidates.len(),
        sizes_mb = ?candidates.iter().map(|w| w.memory_mb).collect::<Vec<_>>(),
        "Balancing workloads"
    );

    let mut queues: Vec<PlacementQueue> = hosts.iter().cloned().map(PlacementQueue::new).collect();

    for workload in candidates {
        let target = heaviest_queue(&queues);
        let queue = &mut queues[target];
        queue.push(workload.clone());

        debug!(
            "added {} to queue {} w/ weight {}",
            workload.footprint_bytes(),
            queue.host_name(),
            queue.weight
        );
    }

    for queue in &queues {
        debug!(
            queue = %queue.host_name(),
            num = queue.len(),
            weight = queue.weight,
            "Placement queue"
        );
    }

    Ok(queues)
}

// Largest remaining weight wins; on a tie the earlier host wins.
fn heaviest_queue(queues: &[PlacementQueue]) -> usize {
    let mut best = 0;
    for (idx, queue) in queues.iter().enumerate().skip(1) {
        if queue.weight > queues[best].weight {
            best = idx;
        }
    }
    best
}
