#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vm_placement_manager::core::{
    Cluster, Host, InventoryGateway, InventorySnapshot, MovePriority, RelocationTask,
    SnapshotInventory, TaskInfo, TaskState, Workload,
};
use vm_placement_manager::errors::{ManagerError, ManagerResult};
use vm_placement_manager::MigrationOptions;

pub fn gb(n: u64) -> u64 {
    n * 1024 * 1024 * 1024
}

// VM sized in whole GB, the API reports MB
pub fn vm(name: &str, size_gb: u64, host: &str) -> Workload {
    Workload::new(name, size_gb * 1024, host)
}

pub fn host(name: &str, size_gb: u64) -> Host {
    Host::new(name, gb(size_gb))
}

pub fn snapshot(hosts: Vec<Host>, workloads: Vec<Workload>) -> InventorySnapshot {
    InventorySnapshot {
        hosts,
        workloads,
        ..Default::default()
    }
}

pub fn fast_options() -> MigrationOptions {
    MigrationOptions {
        poll_interval: Duration::from_millis(1),
        ..Default::default()
    }
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Snapshot gateway that refuses to even issue relocations for some VMs.
pub struct RefusingGateway {
    pub inner: SnapshotInventory,
    pub refuse: Vec<String>,
}

impl RefusingGateway {
    pub fn new(inner: SnapshotInventory, refuse: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            inner,
            refuse: names(refuse),
        })
    }
}

#[async_trait]
impl InventoryGateway for RefusingGateway {
    async fn list_hosts(&self, filter: Option<&[String]>) -> ManagerResult<Vec<Host>> {
        self.inner.list_hosts(filter).await
    }

    async fn list_workloads(&self, filter: Option<&[String]>) -> ManagerResult<Vec<Workload>> {
        self.inner.list_workloads(filter).await
    }

    async fn list_clusters(&self, filter: Option<&[String]>) -> ManagerResult<Vec<Cluster>> {
        self.inner.list_clusters(filter).await
    }

    async fn relocate(
        &self,
        workload: &Workload,
        destination: &Host,
        priority: MovePriority,
    ) -> ManagerResult<Box<dyn RelocationTask>> {
        if self.refuse.contains(&workload.name) {
            return Err(ManagerError::Session("connection reset by peer".to_string()));
        }
        self.inner.relocate(workload, destination, priority).await
    }
}

/// Gateway whose relocation tasks replay a fixed sequence of states. The last
/// state repeats once the script runs out. Also tracks how many relocations
/// are unsettled at once.
pub struct ScriptedGateway {
    pub inner: SnapshotInventory,
    script: Vec<TaskInfo>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedGateway {
    pub fn new(inner: SnapshotInventory, script: Vec<TaskInfo>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            script,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventoryGateway for ScriptedGateway {
    async fn list_hosts(&self, filter: Option<&[String]>) -> ManagerResult<Vec<Host>> {
        self.inner.list_hosts(filter).await
    }

    async fn list_workloads(&self, filter: Option<&[String]>) -> ManagerResult<Vec<Workload>> {
        self.inner.list_workloads(filter).await
    }

    async fn list_clusters(&self, filter: Option<&[String]>) -> ManagerResult<Vec<Cluster>> {
        self.inner.list_clusters(filter).await
    }

    async fn relocate(
        &self,
        workload: &Workload,
        destination: &Host,
        priority: MovePriority,
    ) -> ManagerResult<Box<dyn RelocationTask>> {
        // keep the request log, replace the task
        self.inner.relocate(workload, destination, priority).await?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(ScriptedTask {
            steps: Mutex::new(self.script.iter().cloned().collect()),
            in_flight: Arc::clone(&self.in_flight),
            settled: AtomicBool::new(false),
        }))
    }
}

struct ScriptedTask {
    steps: Mutex<VecDeque<TaskInfo>>,
    in_flight: Arc<AtomicUsize>,
    settled: AtomicBool,
}

#[async_trait]
impl RelocationTask for ScriptedTask {
    async fn info(&self) -> ManagerResult<TaskInfo> {
        let info = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.pop_front().unwrap()
            } else {
                steps.front().cloned().unwrap_or_else(TaskInfo::running)
            }
        };

        if info.state != TaskState::Running && !self.settled.swap(true, Ordering::SeqCst) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(info)
    }
}
