//! The blocking part of a materialization: stream into a `.part` file and
//! finalize it under the (possibly corrected) destination name.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::library;
use crate::storage::{temp_path, PartFile};
use crate::transfer::{ResponseHead, TransferError, TransferSink, TransferSource};

use super::progress::{ProgressThrottle, TransferProgress};

/// Successful transfer, file already renamed into place.
#[derive(Debug)]
pub(super) struct TransferOutcome {
    pub(super) final_path: PathBuf,
    pub(super) bytes: u64,
    pub(super) head: ResponseHead,
}

/// Failure split by side: remote transfer vs. local destination.
#[derive(Debug)]
pub(super) enum TransferJobError {
    Transfer(TransferError),
    Destination(anyhow::Error),
}

/// Sink writing body chunks to storage and reporting progress.
struct StorageSink<'a> {
    part: &'a mut PartFile,
    throttle: ProgressThrottle,
    total: Option<u64>,
}

impl TransferSink for StorageSink<'_> {
    fn begin(&mut self, head: &ResponseHead) {
        self.total = head.content_length;
        self.throttle.report(TransferProgress {
            downloaded_bytes: 0,
            total_bytes: self.total,
        });
    }

    fn write(&mut self, chunk: &[u8]) -> anyhow::Result<()> {
        self.part.write_chunk(chunk)?;
        self.throttle.report(TransferProgress {
            downloaded_bytes: self.part.bytes_written(),
            total_bytes: self.total,
        });
        Ok(())
    }
}

/// Fetch `url` into `dest` (via `dest.part`). If the response content type names a
/// different audio format and that name is free, the file is finalized under the
/// corrected extension.
pub(super) fn run_transfer_blocking(
    source: &dyn TransferSource,
    url: &str,
    dest: &Path,
    throttle: ProgressThrottle,
) -> Result<TransferOutcome, TransferJobError> {
    let mut part = PartFile::create(dest).map_err(TransferJobError::Destination)?;

    let fetched = {
        let mut sink = StorageSink {
            part: &mut part,
            throttle,
            total: None,
        };
        source.fetch(url, &mut sink)
    };
    let head = match fetched {
        Ok(head) => head,
        Err(e) => {
            part.discard();
            return Err(match e {
                TransferError::Sink(err) => TransferJobError::Destination(err),
                other => TransferJobError::Transfer(other),
            });
        }
    };

    // Never rename onto a file (or in-progress transfer) that is already there.
    let final_path = library::corrected_path(dest, head.content_type.as_deref())
        .filter(|p| !p.exists() && !temp_path(p).exists())
        .unwrap_or_else(|| dest.to_path_buf());
    let temp = part.temp_path().to_path_buf();
    let bytes = match part.finalize(&final_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = std::fs::remove_file(&temp);
            return Err(TransferJobError::Destination(e));
        }
    };
    Ok(TransferOutcome {
        final_path,
        bytes,
        head,
    })
}

/// Runs `run_transfer_blocking` on the blocking pool.
pub(super) async fn run_transfer(
    source: Arc<dyn TransferSource>,
    url: String,
    dest: PathBuf,
    throttle: ProgressThrottle,
) -> Result<Result<TransferOutcome, TransferJobError>, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || run_transfer_blocking(source.as_ref(), &url, &dest, throttle)).await
}
