/*
* Migration Executor
* ------------------
*
* Moves one workload to one destination host and babysits the resulting
* asynchronous task until it settles.
*
* Early exits, checked in this order, none of them touch the management API:
*   1. template            -> Skipped(Template)
*   2. already on the host -> Skipped(AlreadyPlaced)
*   3. simulate-only mode  -> Skipped(Simulated)
*
* After that a single relocation is issued at default priority and the task
* is polled: Running -> {Success, Error}. While Running we sleep for the poll
* interval and look again, forever unless a timeout was configured or the
* CancelHandle fires. There are no retries of the relocation itself.
*/

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MigrationSettings;
use crate::core::inventory::{InventoryGateway, MovePriority, RelocationTask, TaskState};
use crate::core::{Host, Workload};
use crate::errors::{ManagerError, ManagerResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOptions {
    pub poll_interval: Duration,
    /// `None` waits as long as the task keeps reporting Running.
    pub timeout: Option<Duration>,
    pub simulate_only: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: None,
            simulate_only: false,
        }
    }
}

impl MigrationOptions {
    pub fn from_settings(settings: &MigrationSettings) -> Self {
        Self {
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            timeout: settings.timeout_secs.map(Duration::from_secs),
            simulate_only: settings.simulate_only,
        }
    }

    pub fn simulated(mut self, simulate_only: bool) -> Self {
        self.simulate_only = simulate_only;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    Template,
    AlreadyPlaced,
    Simulated,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Template => write!(f, "not relocatable"),
            SkipReason::AlreadyPlaced => write!(f, "already in place"),
            SkipReason::Simulated => write!(f, "would migrate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MigrationOutcome {
    Migrated { result: Option<String> },
    Skipped(SkipReason),
}

/// Stops executors from waiting on relocations. Nothing fires it unless asked to.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// One relocation that has been issued and not yet settled.
struct MigrationTask {
    id: Uuid,
    workload: String,
    destination: String,
    issued_at: DateTime<Utc>,
    handle: Box<dyn RelocationTask>,
}

/// Outcome of one (workload, host) pair, as reported to the operator.
#[derive(Debug)]
pub struct MigrationReport {
    pub id: Uuid,
    pub workload: String,
    pub source: Option<String>,
    pub destination: String,
    pub outcome: ManagerResult<MigrationOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MigrationReport {
    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

pub struct MigrationExecutor {
    gateway: Arc<dyn InventoryGateway>,
    options: MigrationOptions,
    cancel: CancelHandle,
}

impl MigrationExecutor {
    pub fn new(gateway: Arc<dyn InventoryGateway>, options: MigrationOptions) -> Self {
        Self {
            gateway,
            options,
            cancel: CancelHandle::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn migrate(&self, workload: &Workload, dest: &Host) -> ManagerResult<MigrationOutcome> {
        self.run(Uuid::new_v4(), workload, dest).await
    }

    /// Migrate and wrap the outcome in a report; failures stay inside the report.
    pub async fn dispatch(&self, workload: &Workload, dest: &Host) -> MigrationReport {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let outcome = self.run(id, workload, dest).await;

        if let Err(e) = &outcome {
            warn!(task = %id, workload = %workload.name, host = %dest.name, error = %e, "Migration did not complete");
        }

        MigrationReport {
            id,
            workload: workload.name.clone(),
            source: workload.host.clone(),
            destination: dest.name.clone(),
            outcome,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn run(&self, id: Uuid, workload: &Workload, dest: &Host) -> ManagerResult<MigrationOutcome> {
        info!(task = %id, "Migrating {} to destination host {}", workload.name, dest.name);

        if workload.template {
            info!(workload = %workload.name, "Not possible to migrate templates, moving on.");
            return Ok(MigrationOutcome::Skipped(SkipReason::Template));
        }

        if workload.is_on(&dest.name) {
            info!(workload = %workload.name, "Migrate complete! VM already running on dest host.");
            return Ok(MigrationOutcome::Skipped(SkipReason::AlreadyPlaced));
        }

        if self.options.simulate_only {
            info!(workload = %workload.name, host = %dest.name, "NOACT: Migration complete!");
            return Ok(MigrationOutcome::Skipped(SkipReason::Simulated));
        }

        if self.cancel.is_cancelled() {
            return Err(ManagerError::MigrationCancelled {
                workload: workload.name.clone(),
                host: dest.name.clone(),
            });
        }

        let handle = self
            .gateway
            .relocate(workload, dest, MovePriority::Default)
            .await
            .map_err(|e| as_migration_failure(e, &workload.name, &dest.name))?;

        let task = MigrationTask {
            id,
            workload: workload.name.clone(),
            destination: dest.name.clone(),
            issued_at: Utc::now(),
            handle,
        };

        self.wait_for_task(task).await
    }

    async fn wait_for_task(&self, task: MigrationTask) -> ManagerResult<MigrationOutcome> {
        let started = Instant::now();
        let mut cancel_rx = self.cancel.subscribe();
        let mut polls: u64 = 0;

        loop {
            let info = task
                .handle
                .info()
                .await
                .map_err(|e| as_migration_failure(e, &task.workload, &task.destination))?;
            polls += 1;

            match info.state {
                TaskState::Running => {}
                TaskState::Success => {
                    match &info.result {
                        Some(result) => info!(
                            task = %task.id,
                            "Task completed successfully w/ result: {}", result
                        ),
                        None => info!(task = %task.id, "Task completed successfully."),
                    }
                    debug!(task = %task.id, polls, issued_at = %task.issued_at, "Relocation settled");
                    return Ok(MigrationOutcome::Migrated { result: info.result });
                }
                TaskState::Error => {
                    let reason = info
                        .error
                        .unwrap_or_else(|| "task ended without success".to_string());
                    warn!(task = %task.id, "Task did not complete successfully: {}", reason);
                    return Err(ManagerError::MigrationFailed {
                        workload: task.workload,
                        host: task.destination,
                        reason,
                    });
                }
            }

            if let Some(limit) = self.options.timeout {
                if started.elapsed() >= limit {
                    return Err(ManagerError::MigrationTimedOut {
                        workload: task.workload,
                        host: task.destination,
                        waited: started.elapsed(),
                    });
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.poll_interval) => {}
                _ = cancelled(&mut cancel_rx) => {
                    return Err(ManagerError::MigrationCancelled {
                        workload: task.workload,
                        host: task.destination,
                    });
                }
            }
        }
    }
}

/// Reports only ever carry per-workload errors, anything run-stopping gets folded in.
fn as_migration_failure(err: ManagerError, workload: &str, host: &str) -> ManagerError {
    if !err.is_fatal() {
        return err;
    }
    ManagerError::MigrationFailed {
        workload: workload.to_string(),
        host: host.to_string(),
        reason: err.to_string(),
    }
}
