pub mod host;
pub mod inventory;
pub mod session;
pub mod snapshot;
pub mod vm;

// exports for lazy devs like us
pub use host::{Cluster, Host};
pub use inventory::{InventoryGateway, MovePriority, RelocationTask, TaskInfo, TaskState};
pub use session::connect;
pub use snapshot::{InventorySnapshot, RelocationRequest, SnapshotInventory};
pub use vm::{PowerState, Workload};
