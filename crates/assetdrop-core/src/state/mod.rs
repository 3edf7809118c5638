//! Download state container: the in-memory source of truth for all records.
//!
//! Every operation is synchronous and in-memory, so it is safe to call from the
//! UI thread. Mutations are applied in call order under one lock and notify
//! observers before returning. Transitions into `Completed`, `Error` or `Paused`
//! (plus supersede, demote and remove) enqueue a snapshot for the record store;
//! progress ticks never do.

mod error;
mod event;
mod persist;

pub use error::StateError;
pub use event::{Observer, StateChange, StateEvent, SubscriptionId};

pub(crate) use persist::{spawn_persistence, PersistCommand, PersistSender};

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use tokio::sync::oneshot;

use crate::record::{
    progress_percent, unix_timestamp, DownloadRecord, DownloadStatus, RecordId, TransitionFields,
};

struct Shared {
    records: RwLock<Vec<DownloadRecord>>,
    observers: RwLock<Vec<(SubscriptionId, Observer)>>,
    next_subscription: AtomicU64,
    persist: Option<PersistSender>,
}

/// Cloneable handle to the container. All clones share the same record set.
#[derive(Clone)]
pub struct DownloadState {
    shared: Arc<Shared>,
}

impl Default for DownloadState {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl DownloadState {
    /// Container without persistence (tests, previews).
    pub fn in_memory() -> Self {
        Self::from_parts(Vec::new(), None)
    }

    pub(crate) fn from_parts(records: Vec<DownloadRecord>, persist: Option<PersistSender>) -> Self {
        Self {
            shared: Arc::new(Shared {
                records: RwLock::new(records),
                observers: RwLock::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                persist,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<DownloadRecord>> {
        self.shared.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<DownloadRecord>> {
        self.shared.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Active record for `asset_id`.
    pub fn get(&self, asset_id: &str) -> Option<DownloadRecord> {
        self.read().iter().find(|r| r.asset_id == asset_id).cloned()
    }

    pub fn get_by_record(&self, record_id: RecordId) -> Option<DownloadRecord> {
        self.read().iter().find(|r| r.record_id == record_id).cloned()
    }

    /// All active records in insertion order.
    pub fn all(&self) -> Vec<DownloadRecord> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Insert `record` unless its asset already has an active record.
    /// Returns false (and changes nothing) in that case.
    pub fn upsert(&self, record: DownloadRecord) -> bool {
        let event = {
            let mut records = self.write();
            if records.iter().any(|r| r.asset_id == record.asset_id) {
                return false;
            }
            let event = StateEvent {
                asset_id: record.asset_id.clone(),
                record_id: record.record_id,
                change: StateChange::Inserted,
            };
            records.push(record);
            event
        };
        self.notify(&event);
        true
    }

    /// Replace the active record of `record.asset_id` (if any) with `record`, keeping
    /// its position. Returns the replaced record.
    pub fn supersede(&self, record: DownloadRecord) -> Option<DownloadRecord> {
        let (event, previous) = {
            let mut records = self.write();
            let asset_id = record.asset_id.clone();
            let record_id = record.record_id;
            let previous = match records.iter().position(|r| r.asset_id == asset_id) {
                Some(idx) => Some(std::mem::replace(&mut records[idx], record)),
                None => {
                    records.push(record);
                    None
                }
            };
            let change = match &previous {
                Some(p) => StateChange::Superseded { previous: p.record_id },
                None => StateChange::Inserted,
            };
            self.enqueue_snapshot(&records);
            (StateEvent { asset_id, record_id, change }, previous)
        };
        tracing::debug!(asset_id = %event.asset_id, record = %event.record_id, "record superseded");
        self.notify(&event);
        previous
    }

    /// Move a record to `to`, applying `fields`. Only the lifecycle edges in
    /// `DownloadStatus::can_transition_to` are accepted.
    pub fn transition(
        &self,
        record_id: RecordId,
        to: DownloadStatus,
        fields: TransitionFields,
    ) -> Result<DownloadRecord, StateError> {
        let (event, updated) = {
            let mut records = self.write();
            let record = records
                .iter_mut()
                .find(|r| r.record_id == record_id)
                .ok_or(StateError::UnknownRecord(record_id))?;
            let from = record.status;
            if !from.can_transition_to(to) {
                return Err(StateError::InvalidTransition { record: record_id, from, to });
            }

            if let Some(total) = fields.total_bytes {
                record.total_bytes = Some(total);
            }
            if let Some(done) = fields.downloaded_bytes {
                record.downloaded_bytes = done;
            }
            match to {
                DownloadStatus::Completed => {
                    record.progress_percent = 100;
                    if let Some(total) = record.total_bytes {
                        record.downloaded_bytes = record.downloaded_bytes.max(total);
                    }
                    record.error_message = None;
                }
                DownloadStatus::Error => {
                    record.progress_percent = record.progress_percent.min(99);
                    record.error_message = Some(
                        fields
                            .error_message
                            .unwrap_or_else(|| "download failed".to_string()),
                    );
                }
                // Resume restarts the transfer from zero.
                DownloadStatus::Pending => {
                    record.reset_progress();
                    record.error_message = None;
                }
                DownloadStatus::Downloading | DownloadStatus::Paused => {
                    record.error_message = None;
                }
            }
            record.status = to;
            record.updated_at = unix_timestamp();
            let updated = record.clone();

            if to.is_persisted() {
                self.enqueue_snapshot(&records);
            }
            (
                StateEvent {
                    asset_id: updated.asset_id.clone(),
                    record_id,
                    change: StateChange::Status { from, to },
                },
                updated,
            )
        };
        tracing::debug!(
            asset_id = %updated.asset_id,
            record = %record_id,
            "status {:?}",
            event.change
        );
        self.notify(&event);
        Ok(updated)
    }

    /// Mark a transfer finished. The caller must have verified that `local_path` exists.
    pub fn complete(&self, record_id: RecordId) -> Result<DownloadRecord, StateError> {
        self.transition(record_id, DownloadStatus::Completed, TransitionFields::default())
    }

    /// Record a failed transfer with a human-readable message.
    pub fn fail(&self, record_id: RecordId, message: impl Into<String>) -> Result<DownloadRecord, StateError> {
        self.transition(record_id, DownloadStatus::Error, TransitionFields::error(message))
    }

    /// Mark an in-flight transfer as paused. Does not stop the transfer itself.
    pub fn pause(&self, record_id: RecordId) -> Result<DownloadRecord, StateError> {
        self.transition(record_id, DownloadStatus::Paused, TransitionFields::default())
    }

    /// Move a paused record back to `Pending` so it re-enters the transfer path.
    pub fn resume(&self, record_id: RecordId) -> Result<DownloadRecord, StateError> {
        self.transition(record_id, DownloadStatus::Pending, TransitionFields::default())
    }

    /// Progress tick for a `Downloading` record. Not persisted. Returns false if the
    /// record is no longer downloading (late tick after completion, pause or failure).
    pub fn update_progress(
        &self,
        record_id: RecordId,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
    ) -> Result<bool, StateError> {
        let event = {
            let mut records = self.write();
            let record = records
                .iter_mut()
                .find(|r| r.record_id == record_id)
                .ok_or(StateError::UnknownRecord(record_id))?;
            if record.status != DownloadStatus::Downloading {
                return Ok(false);
            }
            if total_bytes.is_some() {
                record.total_bytes = total_bytes;
            }
            record.downloaded_bytes = downloaded_bytes;
            record.progress_percent = progress_percent(downloaded_bytes, record.total_bytes);
            StateEvent {
                asset_id: record.asset_id.clone(),
                record_id,
                change: StateChange::Progress {
                    downloaded_bytes,
                    progress_percent: record.progress_percent,
                },
            }
        };
        self.notify(&event);
        Ok(true)
    }

    /// One-time correction of `local_path` (e.g. the served content type disagreed
    /// with the extension inferred from the URL).
    pub fn correct_local_path(&self, record_id: RecordId, path: PathBuf) -> Result<DownloadRecord, StateError> {
        let (event, updated) = {
            let mut records = self.write();
            let record = records
                .iter_mut()
                .find(|r| r.record_id == record_id)
                .ok_or(StateError::UnknownRecord(record_id))?;
            if record.path_corrected {
                return Err(StateError::PathAlreadyCorrected {
                    record: record_id,
                    path: record.local_path.clone(),
                });
            }
            record.local_path = path;
            record.path_corrected = true;
            record.updated_at = unix_timestamp();
            let updated = record.clone();
            (
                StateEvent {
                    asset_id: updated.asset_id.clone(),
                    record_id,
                    change: StateChange::PathCorrected,
                },
                updated,
            )
        };
        self.notify(&event);
        Ok(updated)
    }

    /// Demote a `Completed` record whose file has gone missing back to `Pending`.
    /// Returns false if the asset has no completed record.
    pub fn demote_missing(&self, asset_id: &str) -> bool {
        let event = {
            let mut records = self.write();
            let Some(record) = records
                .iter_mut()
                .find(|r| r.asset_id == asset_id && r.status == DownloadStatus::Completed)
            else {
                return false;
            };
            record.status = DownloadStatus::Pending;
            record.reset_progress();
            record.updated_at = unix_timestamp();
            let event = StateEvent {
                asset_id: record.asset_id.clone(),
                record_id: record.record_id,
                change: StateChange::Demoted,
            };
            self.enqueue_snapshot(&records);
            event
        };
        tracing::warn!(asset_id, "completed asset missing on disk; demoted to pending");
        self.notify(&event);
        true
    }

    /// Explicit user removal of an asset's record. The file on disk is untouched.
    pub fn remove(&self, asset_id: &str) -> Option<DownloadRecord> {
        let removed = {
            let mut records = self.write();
            let idx = records.iter().position(|r| r.asset_id == asset_id)?;
            let removed = records.remove(idx);
            self.enqueue_snapshot(&records);
            removed
        };
        self.notify(&StateEvent {
            asset_id: removed.asset_id.clone(),
            record_id: removed.record_id,
            change: StateChange::Removed,
        });
        Some(removed)
    }

    /// Register an observer; it sees every subsequent mutation.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&StateEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.shared.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.shared
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self
            .shared
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    /// Wait until every snapshot enqueued so far has been written.
    pub async fn flush(&self) -> Result<()> {
        let Some(tx) = &self.shared.persist else {
            return Ok(());
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(PersistCommand::Flush(done_tx)).is_err() {
            anyhow::bail!("persistence task is not running");
        }
        done_rx
            .await
            .map_err(|_| anyhow::anyhow!("persistence task stopped before flushing"))
    }

    /// Must be called with the record lock held so snapshots are queued in mutation order.
    fn enqueue_snapshot(&self, records: &[DownloadRecord]) {
        if let Some(tx) = &self.shared.persist {
            if tx.send(PersistCommand::Snapshot(records.to_vec())).is_err() {
                tracing::warn!("persistence task gone; snapshot not saved");
            }
        }
    }

    fn notify(&self, event: &StateEvent) {
        let observers: Vec<Observer> = self
            .shared
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        for observer in observers {
            observer(event);
        }
    }
}
