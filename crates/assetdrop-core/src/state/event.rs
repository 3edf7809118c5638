//! Change notifications emitted by the state container.

use std::sync::Arc;

use crate::record::{AssetId, DownloadStatus, RecordId};

/// What a mutation did to the record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Inserted,
    Superseded { previous: RecordId },
    Status { from: DownloadStatus, to: DownloadStatus },
    Progress { downloaded_bytes: u64, progress_percent: u8 },
    PathCorrected,
    Demoted,
    Removed,
}

/// One applied mutation, delivered to every observer in the same call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEvent {
    pub asset_id: AssetId,
    pub record_id: RecordId,
    pub change: StateChange,
}

/// Handle returned by `subscribe`; pass it to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Observer callback. Runs on the mutating thread after the record lock is released.
pub type Observer = Arc<dyn Fn(&StateEvent) + Send + Sync>;
