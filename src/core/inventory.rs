//! The seam to the virtualization management API.
//!
//! Everything the placement core needs from the outside world goes through
//! [`InventoryGateway`]: enumerate hosts, workloads and clusters, and kick off
//! an asynchronous relocation whose progress is read back through a
//! [`RelocationTask`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::host::{Cluster, Host};
use crate::core::vm::Workload;
use crate::errors::ManagerResult;

#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// Hosts in inventory order; `None` returns every host, `Some` keeps exact name matches.
    async fn list_hosts(&self, filter: Option<&[String]>) -> ManagerResult<Vec<Host>>;

    async fn list_workloads(&self, filter: Option<&[String]>) -> ManagerResult<Vec<Workload>>;

    async fn list_clusters(&self, filter: Option<&[String]>) -> ManagerResult<Vec<Cluster>>;

    /// Issue one relocation of `workload` into `destination`'s resource pool.
    async fn relocate(
        &self,
        workload: &Workload,
        destination: &Host,
        priority: MovePriority,
    ) -> ManagerResult<Box<dyn RelocationTask>>;
}

/// Handle to an in-flight relocation on the management side.
#[async_trait]
pub trait RelocationTask: Send + Sync {
    async fn info(&self) -> ManagerResult<TaskInfo>;
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MovePriority {
    #[default]
    Default,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    Running,
    Success,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub state: TaskState,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl TaskInfo {
    pub fn running() -> Self {
        Self {
            state: TaskState::Running,
            result: None,
            error: None,
        }
    }

    pub fn success(result: Option<String>) -> Self {
        Self {
            state: TaskState::Success,
            result,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: TaskState::Error,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Exact-name filter shared by gateway implementations.
pub fn matches_filter(name: &str, filter: Option<&[String]>) -> bool {
    filter.map_or(true, |names| names.iter().any(|n| n == name))
}
