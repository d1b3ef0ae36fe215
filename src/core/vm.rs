use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::mb_to_bytes;

/// A virtual machine as the management API reports it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Workload {
    pub name: String,
    pub memory_mb: u64,    // configured memory, the API reports it in MB
    #[serde(default)]
    pub template: bool,    // templates never move
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub power_state: PowerState,
}

impl Workload {
    pub fn new(name: impl Into<String>, memory_mb: u64, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            memory_mb,
            template: false,
            host: Some(host.into()),
            power_state: PowerState::PoweredOn,
        }
    }

    pub fn template(name: impl Into<String>, memory_mb: u64, host: impl Into<String>) -> Self {
        Self {
            template: true,
            power_state: PowerState::PoweredOff,
            ..Self::new(name, memory_mb, host)
        }
    }

    /// Memory footprint in bytes, the unit hosts report capacity in.
    pub fn footprint_bytes(&self) -> u64 {
        mb_to_bytes(self.memory_mb)
    }

    pub fn is_on(&self, host_name: &str) -> bool {
        self.host.as_deref() == Some(host_name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    #[default]
    PoweredOn,
    PoweredOff,
    Suspended,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::PoweredOn => write!(f, "poweredOn"),
            PowerState::PoweredOff => write!(f, "poweredOff"),
            PowerState::Suspended => write!(f, "suspended"),
        }
    }
}
