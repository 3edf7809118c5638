//! Transfer failure type.

use thiserror::Error;

/// Why a fetch did not deliver a complete body.
#[derive(Debug, Error)]
pub enum TransferError {
    /// libcurl reported an error (timeout, connection, DNS, ...).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Fewer bytes arrived than the server announced.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// The sink (local storage) refused a chunk.
    #[error("{0:#}")]
    Sink(anyhow::Error),
}
