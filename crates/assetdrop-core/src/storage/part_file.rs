//! Sequential writer for a `.part` download file.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::temp_path;

/// Temp file for one transfer. Not `Clone`: a transfer writes its body in order
/// from a single blocking thread.
pub struct PartFile {
    writer: BufWriter<File>,
    temp_path: PathBuf,
    written: u64,
}

impl PartFile {
    /// Create (truncating any stale leftover) `<final_path>.part`.
    pub fn create(final_path: &Path) -> Result<Self> {
        let temp_path = temp_path(final_path);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("failed to create temp file: {}", temp_path.display()))?;
        Ok(PartFile {
            writer: BufWriter::with_capacity(64 * 1024, file),
            temp_path,
            written: 0,
        })
    }

    /// Append a body chunk.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        self.writer
            .write_all(data)
            .with_context(|| format!("write failed: {}", self.temp_path.display()))?;
        self.written += data.len() as u64;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Flush, fsync and rename onto `final_path`. Returns the number of bytes written.
    /// Fails if `final_path` is on a different filesystem.
    pub fn finalize(self, final_path: &Path) -> Result<u64> {
        let PartFile { writer, temp_path, written } = self;
        let file = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("flush failed: {}", temp_path.display()))?;
        file.sync_all().context("storage sync failed")?;
        drop(file);

        std::fs::rename(&temp_path, final_path).with_context(|| {
            format!("failed to rename {} to {}", temp_path.display(), final_path.display())
        })?;
        Ok(written)
    }

    /// Drop the temp file after a failed transfer. Best effort.
    pub fn discard(self) {
        let PartFile { writer, temp_path, .. } = self;
        drop(writer);
        match std::fs::remove_file(&temp_path) {
            Ok(()) => tracing::debug!(path = %temp_path.display(), "removed partial download"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %temp_path.display(), "could not remove partial download: {}", e),
        }
    }
}
