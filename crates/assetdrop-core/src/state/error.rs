//! Errors returned by state container mutations.

use std::path::PathBuf;

use thiserror::Error;

use crate::record::{DownloadStatus, RecordId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// No active record carries this id (never created, superseded or removed).
    #[error("no active record {0}")]
    UnknownRecord(RecordId),
    #[error("record {record}: cannot move from {from} to {to}")]
    InvalidTransition {
        record: RecordId,
        from: DownloadStatus,
        to: DownloadStatus,
    },
    #[error("record {record}: local path already corrected to {}", path.display())]
    PathAlreadyCorrected { record: RecordId, path: PathBuf },
}
