use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::inventory::InventoryGateway;
use crate::core::{Host, Workload};
use crate::errors::{ManagerError, ManagerResult};
use crate::migration::{CancelHandle, MigrationExecutor, MigrationOptions, MigrationReport};
use crate::scheduler::balance;
use crate::utils::dedupe_names;

/// Which virtual machines a single-migration run applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadSelection {
    All,
    Named(Vec<String>),
}

impl WorkloadSelection {
    /// `["all"]` selects everything, anything else is a list of names.
    pub fn from_names(names: Vec<String>) -> Self {
        if names.len() == 1 && names[0] == "all" {
            WorkloadSelection::All
        } else {
            WorkloadSelection::Named(names)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Validating,
    Resolving,
    Computing,
    Dispatching,
    Done,
}

/// Sequences validation, resolution, placement and dispatch for one run.
///
/// Anything that fails before `Dispatching` aborts the run with no side
/// effects. Once dispatch starts every pair gets its own report and the run
/// always reaches `Done`.
pub struct Orchestrator {
    gateway: Arc<dyn InventoryGateway>,
    options: MigrationOptions,
    dispatch_concurrency: usize,
    cancel: CancelHandle,
    phase: RunPhase,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn InventoryGateway>, options: MigrationOptions) -> Self {
        Self {
            gateway,
            options,
            dispatch_concurrency: 1,
            cancel: CancelHandle::new(),
            phase: RunPhase::Idle,
        }
    }

    /// More than one runs independent migrations side by side. Default is one.
    pub fn with_dispatch_concurrency(mut self, width: usize) -> Self {
        self.dispatch_concurrency = width.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn enter(&mut self, next: RunPhase) {
        debug!(from = ?self.phase, to = ?next, "Run phase");
        self.phase = next;
    }

    pub async fn run_single_migration(
        &mut self,
        selection: WorkloadSelection,
        source: Option<&str>,
        dest: &str,
    ) -> ManagerResult<Vec<MigrationReport>> {
        self.enter(RunPhase::Validating);

        let source = source.filter(|s| !s.is_empty());
        let filter = match selection {
            WorkloadSelection::Named(names) if names.is_empty() => {
                return Err(ManagerError::InvalidInput(
                    "Must specify VM name (or all) for migration".to_string(),
                ));
            }
            WorkloadSelection::Named(names) => Some(dedupe_names(&names)),
            WorkloadSelection::All => {
                if source.is_none() {
                    return Err(ManagerError::InvalidInput(
                        "Must specify a source host to move all VMs".to_string(),
                    ));
                }
                None
            }
        };
        if dest.trim().is_empty() {
            return Err(ManagerError::InvalidInput(
                "Must specify a destination host for migration".to_string(),
            ));
        }

        self.enter(RunPhase::Resolving);

        let dest_filter = [dest.to_string()];
        let dest_host = crate::with_context!(
            self.gateway.list_hosts(Some(dest_filter.as_slice())).await,
            "resolve destination host"
        )?
        .into_iter()
        .next()
        .ok_or_else(|| ManagerError::host_not_found([dest]))?;

        let vms = crate::with_context!(
            self.gateway.list_workloads(filter.as_deref()).await,
            "list virtual machines"
        )?;

        if let Some(names) = &filter {
            let missing: Vec<String> = names
                .iter()
                .filter(|n| !vms.iter().any(|vm| &vm.name == *n))
                .cloned()
                .collect();
            if vms.is_empty() {
                return Err(ManagerError::WorkloadNotFound(missing));
            }
            if !missing.is_empty() {
                warn!(missing = ?missing, "Some requested VMs were not found, continuing with the rest");
            }
        }

        self.enter(RunPhase::Computing);

        let pairs: Vec<(Workload, Host)> = vms
            .into_iter()
            .filter(|vm| source.map_or(true, |s| vm.is_on(s)))
            .map(|vm| (vm, dest_host.clone()))
            .collect();

        info!(
            count = pairs.len(),
            source = source.unwrap_or("-"),
            dest = %dest_host.name,
            "Migration set resolved"
        );

        let options = self.options.clone();
        Ok(self.dispatch(pairs, options).await)
    }

    pub async fn run_balance(
        &mut self,
        host_names: &[String],
        simulate_only: bool,
    ) -> ManagerResult<Vec<MigrationReport>> {
        self.enter(RunPhase::Validating);

        let names = dedupe_names(host_names);
        if names.len() < 2 {
            return Err(ManagerError::InvalidInput(format!(
                "Number of hosts for balancing must be at least 2. {} provided",
                names.len()
            )));
        }

        self.enter(RunPhase::Resolving);

        let found = crate::with_context!(
            self.gateway.list_hosts(Some(names.as_slice())).await,
            "resolve balancing hosts"
        )?;

        // keep the order the operator asked for, the balancer breaks ties on it
        let mut hosts = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in &names {
            match found.iter().find(|h| &h.name == name) {
                Some(host) => hosts.push(host.clone()),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(ManagerError::host_not_found(missing));
        }

        info!("{} hosts found: {:?}", hosts.len(), names);

        let vms: Vec<Workload> = crate::with_context!(
            self.gateway.list_workloads(None).await,
            "list virtual machines"
        )?
        .into_iter()
        .filter(|vm| !vm.template && names.iter().any(|n| vm.is_on(n)))
        .collect();

        self.enter(RunPhase::Computing);

        let queues = balance(&hosts, &vms)?;
        let pairs: Vec<(Workload, Host)> = queues
            .into_iter()
            .flat_map(|queue| {
                let host = queue.host;
                queue.workloads.into_iter().map(move |vm| (vm, host.clone()))
            })
            .collect();

        let options = self
            .options
            .clone()
            .simulated(simulate_only || self.options.simulate_only);
        Ok(self.dispatch(pairs, options).await)
    }

    async fn dispatch(
        &mut self,
        pairs: Vec<(Workload, Host)>,
        options: MigrationOptions,
    ) -> Vec<MigrationReport> {
        self.enter(RunPhase::Dispatching);

        let executor = MigrationExecutor::new(Arc::clone(&self.gateway), options)
            .with_cancel(self.cancel.clone());
        let width = self.dispatch_concurrency;

        let reports = if width <= 1 {
            let mut reports = Vec::with_capacity(pairs.len());
            for (vm, host) in &pairs {
                reports.push(executor.dispatch(vm, host).await);
            }
            reports
        } else {
            stream::iter(pairs.iter().map(|(vm, host)| executor.dispatch(vm, host)))
                .buffered(width)
                .collect::<Vec<_>>()
                .await
        };

        self.enter(RunPhase::Done);
        reports
    }
}
