pub mod cli;
pub mod cluster;
pub mod config;
pub mod core;
pub mod errors;
pub mod migration;
pub mod monitoring;
pub mod scheduler;
pub mod utils;

// Re-exports
pub use cluster::{Orchestrator, RunPhase, WorkloadSelection};
pub use crate::core::{Host, InventoryGateway, SnapshotInventory, Workload};
pub use errors::{ManagerError, ManagerResult};
pub use migration::{MigrationExecutor, MigrationOptions, MigrationOutcome, MigrationReport};
pub use scheduler::{balance, PlacementQueue};
pub type AsyncMutex<T> = tokio::sync::Mutex<T>;
