//! Types describing one materialization attempt.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Catalog asset identifier (foreign key owned by the backend).
pub type AssetId = String;

/// Identity of one materialization attempt. A re-materialization gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

static NEXT_RECORD_SEQ: AtomicU64 = AtomicU64::new(1);

impl RecordId {
    /// Allocate a fresh id: creation time in the high bits, process-local sequence in the low bits.
    pub fn generate() -> Self {
        let seq = NEXT_RECORD_SEQ.fetch_add(1, Ordering::Relaxed) & 0xF_FFFF;
        let secs = unix_timestamp() as u64;
        RecordId((secs << 20) | seq)
    }

    pub fn from_raw(raw: u64) -> Self {
        RecordId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Lifecycle status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Error,
    Paused,
}

impl DownloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Error => "error",
            DownloadStatus::Paused => "paused",
        }
    }

    /// Whether the container mirrors a transition into this status to the record store.
    pub fn is_persisted(self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Error | DownloadStatus::Paused
        )
    }

    /// Allowed status edges. Completion and failure go through dedicated
    /// container operations but are still checked here.
    pub fn can_transition_to(self, next: DownloadStatus) -> bool {
        use DownloadStatus::*;
        matches!(
            (self, next),
            (Pending, Downloading)
                | (Downloading, Completed)
                | (Downloading, Error)
                | (Downloading, Paused)
                | (Paused, Pending)
        )
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One asset's local materialization state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub record_id: RecordId,
    pub asset_id: AssetId,
    pub title: String,
    pub source_url: String,
    pub genre: Option<String>,
    pub local_path: PathBuf,
    /// Set once the one-time path correction has been applied.
    pub path_corrected: bool,
    pub status: DownloadStatus,
    pub progress_percent: u8,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DownloadRecord {
    /// New `Pending` record for a first (or superseding) materialization attempt.
    pub fn pending(
        asset_id: impl Into<AssetId>,
        title: impl Into<String>,
        source_url: impl Into<String>,
        genre: Option<String>,
        local_path: PathBuf,
    ) -> Self {
        let now = unix_timestamp();
        Self {
            record_id: RecordId::generate(),
            asset_id: asset_id.into(),
            title: title.into(),
            source_url: source_url.into(),
            genre,
            local_path,
            path_corrected: false,
            status: DownloadStatus::Pending,
            progress_percent: 0,
            downloaded_bytes: 0,
            total_bytes: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reset transfer progress (used when an attempt cannot be trusted any more).
    pub(crate) fn reset_progress(&mut self) {
        self.progress_percent = 0;
        self.downloaded_bytes = 0;
        self.total_bytes = None;
    }
}

/// Optional field updates carried by a status transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionFields {
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub error_message: Option<String>,
}

impl TransitionFields {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Percent complete for a transfer, clamped to 99 until the record is completed.
pub fn progress_percent(downloaded: u64, total: Option<u64>) -> u8 {
    match total {
        Some(total) if total > 0 => {
            let pct = downloaded.saturating_mul(100) / total;
            pct.min(99) as u8
        }
        _ => 0,
    }
}

/// Current time as Unix seconds.
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
