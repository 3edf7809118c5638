//! Progress plumbing: the blocking transfer thread reports through a channel,
//! and an async task applies the updates to the state container.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::record::RecordId;
use crate::state::DownloadState;

/// Snapshot of one transfer's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

/// Rate limiter for progress reports from the transfer thread.
pub(super) struct ProgressThrottle {
    tx: mpsc::Sender<TransferProgress>,
    interval: Duration,
    last_sent: Option<Instant>,
}

impl ProgressThrottle {
    pub(super) fn new(tx: mpsc::Sender<TransferProgress>, interval: Duration) -> Self {
        Self {
            tx,
            interval,
            last_sent: None,
        }
    }

    /// Send `progress` unless one was sent less than `interval` ago. Never blocks;
    /// a full channel drops the report.
    pub(super) fn report(&mut self, progress: TransferProgress) {
        let now = Instant::now();
        if let Some(last) = self.last_sent {
            if now.duration_since(last) < self.interval {
                return;
            }
        }
        if self.tx.try_send(progress).is_ok() {
            self.last_sent = Some(now);
        }
    }
}

/// Apply progress reports to `record_id` until the sender side is dropped.
pub(super) async fn run_progress_loop(
    mut rx: mpsc::Receiver<TransferProgress>,
    state: DownloadState,
    record_id: RecordId,
) {
    while let Some(p) = rx.recv().await {
        match state.update_progress(record_id, p.downloaded_bytes, p.total_bytes) {
            Ok(true) => {}
            Ok(false) => tracing::trace!(record = %record_id, "late progress tick ignored"),
            Err(e) => {
                tracing::debug!(record = %record_id, "progress update dropped: {}", e);
                break;
            }
        }
    }
}
