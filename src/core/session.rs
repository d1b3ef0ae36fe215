use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::SessionSettings;
use crate::core::inventory::InventoryGateway;
use crate::core::snapshot::SnapshotInventory;
use crate::errors::{ManagerError, ManagerResult};

/// Open a management session for the configured endpoint.
///
/// Only snapshot endpoints (`file://...` or a `.json` path) ship with a driver;
/// a live management API plugs in by implementing [`InventoryGateway`].
pub async fn connect(settings: &SessionSettings) -> ManagerResult<Arc<dyn InventoryGateway>> {
    let Some(path) = snapshot_path(&settings.endpoint) else {
        error!(endpoint = %settings.endpoint, port = settings.port, "No driver for endpoint");
        return Err(ManagerError::Session(format!(
            "no management driver for {}:{}",
            settings.endpoint, settings.port
        )));
    };

    let inventory = match SnapshotInventory::load(&path).await {
        Ok(inv) => inv,
        Err(e) => {
            error!("Failed to open management session: {:#}", e);
            return Err(ManagerError::Session(format!("{:#}", e)));
        }
    };

    info!(endpoint = %settings.endpoint, user = %settings.user, "Management session established");
    Ok(Arc::new(inventory))
}

fn snapshot_path(endpoint: &str) -> Option<PathBuf> {
    if let Some(path) = endpoint.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    endpoint.ends_with(".json").then(|| PathBuf::from(endpoint))
}
