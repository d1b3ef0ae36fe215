// Migration executor tests: early exits, the polling loop and its escape hatches.
// Moving live VMs around is nerve-wracking, moving fake ones is just fun! 🚚

mod common;

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{fast_options, host, snapshot, vm, RefusingGateway, ScriptedGateway};
use vm_placement_manager::core::{MovePriority, SnapshotInventory, TaskInfo, Workload};
use vm_placement_manager::errors::ManagerError;
use vm_placement_manager::migration::{
    CancelHandle, MigrationExecutor, MigrationOutcome, SkipReason,
};

fn lab() -> SnapshotInventory {
    SnapshotInventory::new(snapshot(
        vec![host("esx-01", 128), host("esx-02", 128)],
        vec![
            vm("web-01", 8, "esx-01"),
            Workload::template("tmpl-ubuntu", 4, "esx-01"),
        ],
    ))
}

fn executor(inventory: &SnapshotInventory) -> MigrationExecutor {
    MigrationExecutor::new(Arc::new(inventory.clone()), fast_options())
}

#[tokio::test]
async fn test_template_is_not_relocatable() -> Result<()> {
    let inventory = lab();
    let tmpl = Workload::template("tmpl-ubuntu", 4, "esx-01");

    let outcome = executor(&inventory).migrate(&tmpl, &host("esx-02", 128)).await?;

    assert_eq!(outcome, MigrationOutcome::Skipped(SkipReason::Template));
    assert!(inventory.relocations().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_already_placed_is_a_no_op() -> Result<()> {
    let inventory = lab();

    let outcome = executor(&inventory)
        .migrate(&vm("web-01", 8, "esx-01"), &host("esx-01", 128))
        .await?;

    assert_eq!(outcome, MigrationOutcome::Skipped(SkipReason::AlreadyPlaced));
    assert!(inventory.relocations().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_simulate_only_reports_intent() -> Result<()> {
    let inventory = lab();
    let executor = MigrationExecutor::new(
        Arc::new(inventory.clone()),
        fast_options().simulated(true),
    );

    let outcome = executor
        .migrate(&vm("web-01", 8, "esx-01"), &host("esx-02", 128))
        .await?;

    assert_eq!(outcome, MigrationOutcome::Skipped(SkipReason::Simulated));
    assert!(inventory.relocations().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_early_exits_checked_in_order() -> Result<()> {
    let inventory = lab();
    let executor = MigrationExecutor::new(
        Arc::new(inventory.clone()),
        fast_options().simulated(true),
    );

    // template beats everything, even when it already sits on the destination
    let tmpl = Workload::template("tmpl-ubuntu", 4, "esx-02");
    let outcome = executor.migrate(&tmpl, &host("esx-02", 128)).await?;
    assert_eq!(outcome, MigrationOutcome::Skipped(SkipReason::Template));

    // in place beats simulate
    let outcome = executor
        .migrate(&vm("web-01", 8, "esx-02"), &host("esx-02", 128))
        .await?;
    assert_eq!(outcome, MigrationOutcome::Skipped(SkipReason::AlreadyPlaced));
    Ok(())
}

#[tokio::test]
async fn test_polls_until_success() -> Result<()> {
    let mut snap = snapshot(
        vec![host("esx-01", 128), host("esx-02", 128)],
        vec![vm("web-01", 8, "esx-01")],
    );
    snap.running_polls = 5;
    let inventory = SnapshotInventory::new(snap);

    let outcome = executor(&inventory)
        .migrate(&vm("web-01", 8, "esx-01"), &host("esx-02", 128))
        .await?;

    assert_eq!(outcome, MigrationOutcome::Migrated { result: None });

    let issued = inventory.relocations().await;
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].workload, "web-01");
    assert_eq!(issued[0].destination, "esx-02");
    assert_eq!(issued[0].priority, MovePriority::Default);

    let after = inventory.snapshot().await;
    assert_eq!(after.workloads[0].host.as_deref(), Some("esx-02"));
    Ok(())
}

// The management side may hand back a result payload, it should reach the operator untouched 📦
#[tokio::test]
async fn test_success_result_payload_is_kept() -> Result<()> {
    let inventory = lab();
    let gateway = ScriptedGateway::new(
        inventory.clone(),
        vec![
            TaskInfo::running(),
            TaskInfo::success(Some("vm-1042 moved to esx-02".to_string())),
        ],
    );
    let executor = MigrationExecutor::new(gateway, fast_options());

    let outcome = executor
        .migrate(&vm("web-01", 8, "esx-01"), &host("esx-02", 128))
        .await?;

    assert_eq!(
        outcome,
        MigrationOutcome::Migrated {
            result: Some("vm-1042 moved to esx-02".to_string())
        }
    );
    assert_eq!(inventory.relocations().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_task_error_becomes_migration_failed() {
    let mut snap = snapshot(
        vec![host("esx-01", 128), host("esx-02", 128)],
        vec![vm("web-01", 8, "esx-01")],
    );
    snap.running_polls = 2;
    snap.faults = HashMap::from([(
        "web-01".to_string(),
        "insufficient resources on destination".to_string(),
    )]);
    let inventory = SnapshotInventory::new(snap);

    let err = executor(&inventory)
        .migrate(&vm("web-01", 8, "esx-01"), &host("esx-02", 128))
        .await
        .unwrap_err();

    match err {
        ManagerError::MigrationFailed { workload, host, reason } => {
            assert_eq!(workload, "web-01");
            assert_eq!(host, "esx-02");
            assert!(reason.contains("insufficient resources"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!ManagerError::MigrationFailed {
        workload: String::new(),
        host: String::new(),
        reason: String::new(),
    }
    .is_fatal());

    // failed relocation leaves the VM where it was
    let after = inventory.snapshot().await;
    assert_eq!(after.workloads[0].host.as_deref(), Some("esx-01"));
}

#[tokio::test]
async fn test_issue_failure_is_reported_as_migration_failure() {
    let gateway = RefusingGateway::new(lab(), &["web-01"]);
    let executor = MigrationExecutor::new(gateway, fast_options());

    let err = executor
        .migrate(&vm("web-01", 8, "esx-01"), &host("esx-02", 128))
        .await
        .unwrap_err();

    assert!(matches!(err, ManagerError::MigrationFailed { .. }));
    assert!(err.to_string().contains("connection reset"));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_optional_timeout_stops_waiting() {
    let mut snap = snapshot(
        vec![host("esx-01", 128), host("esx-02", 128)],
        vec![vm("web-01", 8, "esx-01")],
    );
    snap.running_polls = u32::MAX;
    let inventory = SnapshotInventory::new(snap);

    let mut options = fast_options();
    options.timeout = Some(Duration::from_millis(30));
    let executor = MigrationExecutor::new(Arc::new(inventory.clone()), options);

    let err = executor
        .migrate(&vm("web-01", 8, "esx-01"), &host("esx-02", 128))
        .await
        .unwrap_err();

    match err {
        ManagerError::MigrationTimedOut { waited, .. } => {
            assert!(waited >= Duration::from_millis(30))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_cancel_handle_stops_waiting() {
    let mut snap = snapshot(
        vec![host("esx-01", 128), host("esx-02", 128)],
        vec![vm("web-01", 8, "esx-01")],
    );
    snap.running_polls = u32::MAX;
    let inventory = SnapshotInventory::new(snap);

    let cancel = CancelHandle::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(25)).await;
        trigger.cancel();
    });

    let executor = executor(&inventory).with_cancel(cancel.clone());
    let err = executor
        .migrate(&vm("web-01", 8, "esx-01"), &host("esx-02", 128))
        .await
        .unwrap_err();

    assert!(matches!(err, ManagerError::MigrationCancelled { .. }));
    assert!(cancel.is_cancelled());
    assert_eq!(inventory.relocations().await.len(), 1);
}

#[tokio::test]
async fn test_cancelled_before_issue_sends_nothing() {
    let inventory = lab();
    let cancel = CancelHandle::new();
    cancel.cancel();

    let err = executor(&inventory)
        .with_cancel(cancel)
        .migrate(&vm("web-01", 8, "esx-01"), &host("esx-02", 128))
        .await
        .unwrap_err();

    assert!(matches!(err, ManagerError::MigrationCancelled { .. }));
    assert!(inventory.relocations().await.is_empty());
}

#[tokio::test]
async fn test_dispatch_wraps_outcome_in_report() {
    let inventory = lab();

    let report = executor(&inventory)
        .dispatch(&vm("web-01", 8, "esx-01"), &host("esx-02", 128))
        .await;

    assert_eq!(report.workload, "web-01");
    assert_eq!(report.source.as_deref(), Some("esx-01"));
    assert_eq!(report.destination, "esx-02");
    assert!(!report.is_failure());
    assert!(report.finished_at >= report.started_at);
}
