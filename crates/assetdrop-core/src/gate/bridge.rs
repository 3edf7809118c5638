//! The OS-facing drag bridge: exactly two operations, both synchronous.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("drag bridge rejected export: {0}")]
    Rejected(String),
}

/// Native drag source. Called from inside the drag-start handler, so
/// implementations must not block on I/O.
pub trait DragBridge: Send + Sync {
    /// Expose one local file to the OS as the drag payload.
    fn export_file(&self, path: &Path) -> Result<(), BridgeError>;
    /// Expose several local files as one drag payload.
    fn export_files(&self, paths: &[PathBuf]) -> Result<(), BridgeError>;
}

/// Bridge that only logs and remembers what it was handed. Used by the CLI and tests.
#[derive(Debug, Default)]
pub struct LoggingBridge {
    exports: Mutex<Vec<Vec<PathBuf>>>,
}

impl LoggingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every export so far, one entry per drag gesture.
    pub fn exports(&self) -> Vec<Vec<PathBuf>> {
        self.exports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, paths: Vec<PathBuf>) {
        self.exports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(paths);
    }
}

impl DragBridge for LoggingBridge {
    fn export_file(&self, path: &Path) -> Result<(), BridgeError> {
        tracing::info!(path = %path.display(), "drag export");
        self.record(vec![path.to_path_buf()]);
        Ok(())
    }

    fn export_files(&self, paths: &[PathBuf]) -> Result<(), BridgeError> {
        tracing::info!(count = paths.len(), "drag export (batch)");
        for path in paths {
            tracing::debug!(path = %path.display(), "batch item");
        }
        self.record(paths.to_vec());
        Ok(())
    }
}
