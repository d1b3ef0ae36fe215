/*
* Run Summary
* -----------
*
* Tallies the per-workload reports of one run so the operator gets a closing
* line after the individual results: how many moved, how many were skipped
* (templates, already placed, dry run) and how many failed.
*
* Failures never hide successes: the summary is built from every report,
* including the ones that came before a failing migration.
*/

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::migration::{MigrationOutcome, MigrationReport, SkipReason};

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub migrated: usize,
    pub skipped_template: usize,
    pub skipped_in_place: usize,
    pub simulated: usize,
    pub failed: usize,
    pub failed_workloads: Vec<String>,
    pub elapsed_ms: i64,
}

impl RunSummary {
    pub fn from_reports(reports: &[MigrationReport]) -> Self {
        let mut summary = Self::default();

        for report in reports {
            match &report.outcome {
                Ok(MigrationOutcome::Migrated { .. }) => summary.migrated += 1,
                Ok(MigrationOutcome::Skipped(SkipReason::Template)) => summary.skipped_template += 1,
                Ok(MigrationOutcome::Skipped(SkipReason::AlreadyPlaced)) => {
                    summary.skipped_in_place += 1
                }
                Ok(MigrationOutcome::Skipped(SkipReason::Simulated)) => summary.simulated += 1,
                Err(_) => {
                    summary.failed += 1;
                    summary.failed_workloads.push(report.workload.clone());
                }
            }
        }

        let first = reports.iter().map(|r| r.started_at).min();
        let last = reports.iter().map(|r| r.finished_at).max();
        if let (Some(first), Some(last)) = (first, last) {
            summary.elapsed_ms = (last - first).num_milliseconds();
        }

        summary
    }

    pub fn total(&self) -> usize {
        self.migrated + self.skipped_template + self.skipped_in_place + self.simulated + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn log(&self) {
        if self.has_failures() {
            warn!(
                migrated = self.migrated,
                failed = self.failed,
                failed_vms = ?self.failed_workloads,
                "Run finished with failures"
            );
        } else {
            info!(
                migrated = self.migrated,
                skipped = self.total() - self.migrated,
                elapsed_ms = self.elapsed_ms,
                "Run finished"
            );
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TOTAL: {} | MIGRATED: {} | SIMULATED: {} | IN PLACE: {} | TEMPLATES: {} | FAILED: {}",
            self.total(),
            self.migrated,
            self.simulated,
            self.skipped_in_place,
            self.skipped_template,
            self.failed
        )
    }
}
