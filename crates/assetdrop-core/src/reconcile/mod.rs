//! Startup reconciliation: the only way to get a persisted `DownloadState`.
//!
//! Loads the stored snapshot, drops entries that cannot be trusted, normalizes
//! anything a previous process left mid-transfer, writes the result back and
//! starts the persistence task.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use crate::record::{DownloadRecord, DownloadStatus};
use crate::record_store::RecordStore;
use crate::state::{spawn_persistence, DownloadState};

/// Counts of what reconciliation did to the stored snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records present in the resulting state.
    pub kept: usize,
    /// `Downloading` records reset to `Pending`.
    pub demoted: usize,
    /// `Completed` records whose file no longer exists.
    pub dropped_missing: usize,
    /// Malformed, unsupported-schema or duplicate entries.
    pub dropped_invalid: usize,
}

/// A live state container backed by the store.
pub struct Reconciled {
    pub state: DownloadState,
    pub report: ReconcileReport,
    /// The persistence task; it ends once every `DownloadState` clone is dropped.
    pub persistence: JoinHandle<()>,
}

impl std::fmt::Debug for Reconciled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciled")
            .field("records", &self.state.len())
            .field("report", &self.report)
            .finish()
    }
}

pub struct Reconciler {
    store: RecordStore,
}

impl Reconciler {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Run once; consumes the store so it cannot run again over it.
    pub async fn run(self) -> Result<Reconciled> {
        let store = self.store;
        let (records, invalid) = store
            .load_snapshot()
            .await
            .context("load download snapshot")?;

        let mut report = ReconcileReport {
            dropped_invalid: invalid,
            ..ReconcileReport::default()
        };
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(records.len());

        for record in records {
            if !seen.insert(record.asset_id.clone()) {
                tracing::warn!(asset_id = %record.asset_id, "duplicate record in snapshot; dropped");
                report.dropped_invalid += 1;
                continue;
            }
            if record.status == DownloadStatus::Completed
                && !tokio::fs::try_exists(&record.local_path).await.unwrap_or(false)
            {
                tracing::warn!(
                    asset_id = %record.asset_id,
                    path = %record.local_path.display(),
                    "completed asset missing on disk; record dropped"
                );
                report.dropped_missing += 1;
                continue;
            }
            if record.status == DownloadStatus::Downloading {
                report.demoted += 1;
            }
            kept.push(normalize(record));
        }
        report.kept = kept.len();

        store
            .save_snapshot(&kept)
            .await
            .context("write reconciled snapshot")?;
        let (tx, persistence) = spawn_persistence(store);
        let state = DownloadState::from_parts(kept, Some(tx));

        tracing::info!(
            kept = report.kept,
            demoted = report.demoted,
            dropped_missing = report.dropped_missing,
            dropped_invalid = report.dropped_invalid,
            "download records reconciled"
        );
        Ok(Reconciled {
            state,
            report,
            persistence,
        })
    }
}

/// Bring one surviving record back within the lifecycle invariants.
fn normalize(mut record: DownloadRecord) -> DownloadRecord {
    match record.status {
        DownloadStatus::Completed => {
            record.progress_percent = 100;
            record.error_message = None;
        }
        // Nothing survives a restart mid-transfer.
        DownloadStatus::Downloading | DownloadStatus::Pending => {
            record.status = DownloadStatus::Pending;
            record.reset_progress();
            record.error_message = None;
        }
        DownloadStatus::Paused => {
            record.progress_percent = record.progress_percent.min(99);
            record.error_message = None;
        }
        DownloadStatus::Error => {
            record.progress_percent = record.progress_percent.min(99);
        }
    }
    record
}
