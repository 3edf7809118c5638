//! Errors surfaced to `materialize` callers.

use std::path::PathBuf;

use thiserror::Error;

use crate::record::{AssetId, DownloadStatus};
use crate::state::StateError;
use crate::transfer::TransferError;

/// Why an asset could not be materialized. Transfer and destination failures are
/// also recorded on the asset's record (`status = Error`).
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// Network or stream failure while fetching the asset.
    #[error("transfer of {asset_id} failed: {source}")]
    TransferFailure {
        asset_id: AssetId,
        #[source]
        source: TransferError,
    },
    /// Local write failure (permissions, disk full, rename).
    #[error("cannot write {}: {message}", path.display())]
    DestinationWriteFailure { path: PathBuf, message: String },
    /// The record moved out of the transfer path while it was running (paused or removed).
    #[error("materialization of {asset_id} interrupted: record is {status}")]
    Interrupted {
        asset_id: AssetId,
        status: DownloadStatus,
    },
    #[error(transparent)]
    State(#[from] StateError),
    #[error("transfer task failed: {0}")]
    Task(String),
}

impl MaterializeError {
    /// Message stored on the record for this failure.
    pub(crate) fn record_message(&self) -> String {
        match self {
            MaterializeError::TransferFailure { source, .. } => source.to_string(),
            MaterializeError::DestinationWriteFailure { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
