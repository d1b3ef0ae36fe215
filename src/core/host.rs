use serde::{Deserialize, Serialize};

/// A physical server that workloads can be placed on.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Host {
    pub name: String,
    pub memory_bytes: u64,
    #[serde(default)]
    pub cluster: Option<String>,
}

impl Host {
    pub fn new(name: impl Into<String>, memory_bytes: u64) -> Self {
        Self {
            name: name.into(),
            memory_bytes,
            cluster: None,
        }
    }
}

/// Compute cluster grouping; listed for the operator, ignored by placement.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub name: String,
    #[serde(default)]
    pub hosts: Vec<String>,
}
