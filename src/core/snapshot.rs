use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::host::{Cluster, Host};
use crate::core::inventory::{
    matches_filter, InventoryGateway, MovePriority, RelocationTask, TaskInfo,
};
use crate::core::vm::Workload;
use crate::errors::{ManagerError, ManagerResult};
use crate::AsyncMutex;

/// Serialized inventory the snapshot gateway serves from.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub workloads: Vec<Workload>,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    /// How many times a relocation reports Running before it settles.
    #[serde(default)]
    pub running_polls: u32,
    /// Workload name -> error message its relocation ends with.
    #[serde(default)]
    pub faults: HashMap<String, String>,
}

/// One relocation request as it reached the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationRequest {
    pub workload: String,
    pub destination: String,
    pub priority: MovePriority,
}

struct SnapshotState {
    snapshot: InventorySnapshot,
    relocations: Vec<RelocationRequest>,
}

/// In-memory gateway over an [`InventorySnapshot`], used for lab runs and tests.
#[derive(Clone)]
pub struct SnapshotInventory {
    state: Arc<AsyncMutex<SnapshotState>>,
}

impl SnapshotInventory {
    pub fn new(snapshot: InventorySnapshot) -> Self {
        Self {
            state: Arc::new(AsyncMutex::new(SnapshotState {
                snapshot,
                relocations: Vec::new(),
            })),
        }
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading inventory snapshot {}", path.display()))?;
        let snapshot: InventorySnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parsing inventory snapshot {}", path.display()))?;

        info!(
            path = %path.display(),
            hosts = snapshot.hosts.len(),
            vms = snapshot.workloads.len(),
            "Loaded inventory snapshot"
        );
        Ok(Self::new(snapshot))
    }

    /// Every relocation issued so far, in order.
    pub async fn relocations(&self) -> Vec<RelocationRequest> {
        self.state.lock().await.relocations.clone()
    }

    pub async fn snapshot(&self) -> InventorySnapshot {
        self.state.lock().await.snapshot.clone()
    }
}

#[async_trait]
impl InventoryGateway for SnapshotInventory {
    async fn list_hosts(&self, filter: Option<&[String]>) -> ManagerResult<Vec<Host>> {
        let state = self.state.lock().await;
        Ok(state
            .snapshot
            .hosts
            .iter()
            .filter(|h| matches_filter(&h.name, filter))
            .cloned()
            .collect())
    }

    async fn list_workloads(&self, filter: Option<&[String]>) -> ManagerResult<Vec<Workload>> {
        let state = self.state.lock().await;
        Ok(state
            .snapshot
            .workloads
            .iter()
            .filter(|w| matches_filter(&w.name, filter))
            .cloned()
            .collect())
    }

    async fn list_clusters(&self, filter: Option<&[String]>) -> ManagerResult<Vec<Cluster>> {
        let state = self.state.lock().await;
        Ok(state
            .snapshot
            .clusters
            .iter()
            .filter(|c| matches_filter(&c.name, filter))
            .cloned()
            .collect())
    }

    async fn relocate(
        &self,
        workload: &Workload,
        destination: &Host,
        priority: MovePriority,
    ) -> ManagerResult<Box<dyn RelocationTask>> {
        let mut state = self.state.lock().await;

        if !state.snapshot.workloads.iter().any(|w| w.name == workload.name) {
            return Err(ManagerError::MigrationFailed {
                workload: workload.name.clone(),
                host: destination.name.clone(),
                reason: "virtual machine is not in the inventory".to_string(),
            });
        }
        if !state.snapshot.hosts.iter().any(|h| h.name == destination.name) {
            return Err(ManagerError::MigrationFailed {
                workload: workload.name.clone(),
                host: destination.name.clone(),
                reason: "destination host is not in the inventory".to_string(),
            });
        }

        state.relocations.push(RelocationRequest {
            workload: workload.name.clone(),
            destination: destination.name.clone(),
            priority,
        });
        debug!(workload = %workload.name, host = %destination.name, ?priority, "Relocation accepted");

        Ok(Box::new(SnapshotTask {
            state: Arc::clone(&self.state),
            workload: workload.name.clone(),
            destination: destination.name.clone(),
            polls_left: AtomicU32::new(state.snapshot.running_polls),
            fault: state.snapshot.faults.get(&workload.name).cloned(),
            applied: AtomicBool::new(false),
        }))
    }
}

struct SnapshotTask {
    state: Arc<AsyncMutex<SnapshotState>>,
    workload: String,
    destination: String,
    polls_left: AtomicU32,
    fault: Option<String>,
    applied: AtomicBool,
}

#[async_trait]
impl RelocationTask for SnapshotTask {
    async fn info(&self) -> ManagerResult<TaskInfo> {
        if self
            .polls_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(TaskInfo::running());
        }

        if let Some(fault) = &self.fault {
            return Ok(TaskInfo::failed(fault.clone()));
        }

        // first terminal read moves the VM in the snapshot
        if !self.applied.swap(true, Ordering::SeqCst) {
            let mut state = self.state.lock().await;
            if let Some(vm) = state
                .snapshot
                .workloads
                .iter_mut()
                .find(|w| w.name == self.workload)
            {
                vm.host = Some(self.destination.clone());
            }
        }

        Ok(TaskInfo::success(None))
    }
}
