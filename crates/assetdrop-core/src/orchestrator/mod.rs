//! Download orchestrator: turns "I own asset X" into a verified file on disk.
//!
//! Pipeline per call: dedup → destination → `Pending` record → transfer slot →
//! `Downloading` → stream to `.part` → rename → `Completed` (or `Error`).
//! At most `max_concurrent_transfers` transfers run at once; further calls wait
//! in `Pending` for a slot.

mod error;
mod execute;
mod in_flight;
mod progress;

pub use error::MaterializeError;
pub use progress::TransferProgress;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, Semaphore};

use crate::config::AssetDropConfig;
use crate::library;
use crate::record::{AssetId, DownloadRecord, DownloadStatus, RecordId, TransitionFields};
use crate::state::DownloadState;
use crate::transfer::TransferSource;

use self::execute::{run_transfer, TransferJobError};
use self::in_flight::InFlight;
use self::progress::{run_progress_loop, ProgressThrottle};

/// What the caller knows about an owned asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeRequest {
    pub asset_id: AssetId,
    pub title: String,
    pub source_url: String,
    pub genre: Option<String>,
}

impl MaterializeRequest {
    pub fn new(
        asset_id: impl Into<AssetId>,
        title: impl Into<String>,
        source_url: impl Into<String>,
        genre: Option<String>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            title: title.into(),
            source_url: source_url.into(),
            genre,
        }
    }

    /// Request that re-materializes an existing record with its own metadata.
    pub fn from_record(record: &DownloadRecord) -> Self {
        Self {
            asset_id: record.asset_id.clone(),
            title: record.title.clone(),
            source_url: record.source_url.clone(),
            genre: record.genre.clone(),
        }
    }
}

struct Inner {
    state: DownloadState,
    source: Arc<dyn TransferSource>,
    library_root: PathBuf,
    slots: Semaphore,
    in_flight: InFlight,
    /// Serializes destination choice and record creation so two assets never
    /// pick the same path.
    placement: Mutex<()>,
    progress_interval: Duration,
}

/// Cloneable handle; clones share slots and the in-flight set.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        state: DownloadState,
        source: Arc<dyn TransferSource>,
        library_root: PathBuf,
        max_concurrent_transfers: usize,
        progress_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state,
                source,
                library_root,
                slots: Semaphore::new(max_concurrent_transfers.max(1)),
                in_flight: InFlight::default(),
                placement: Mutex::new(()),
                progress_interval,
            }),
        }
    }

    pub fn from_config(
        cfg: &AssetDropConfig,
        state: DownloadState,
        source: Arc<dyn TransferSource>,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(
            state,
            source,
            cfg.library_root()?,
            cfg.max_concurrent_transfers(),
            cfg.progress_interval(),
        ))
    }

    pub fn state(&self) -> &DownloadState {
        &self.inner.state
    }

    pub fn library_root(&self) -> &Path {
        &self.inner.library_root
    }

    /// Whether a materialization for `asset_id` is queued or transferring.
    pub fn is_in_flight(&self, asset_id: &str) -> bool {
        self.inner.in_flight.contains(asset_id)
    }

    /// Materialize `req.asset_id` and return its local path.
    ///
    /// Returns immediately with the current path if the asset is already in flight
    /// or completed with its file present. Otherwise waits for a transfer slot and
    /// runs the transfer; failures are recorded on the record and returned.
    pub async fn materialize(&self, req: MaterializeRequest) -> Result<PathBuf, MaterializeError> {
        let state = &self.inner.state;

        let Some(_claim) = self.inner.in_flight.try_claim(&req.asset_id) else {
            tracing::debug!(asset_id = %req.asset_id, "materialization in flight; deduplicated");
            let path = state
                .get(&req.asset_id)
                .map(|r| r.local_path)
                .unwrap_or_else(|| self.destination_for(&req));
            return Ok(path);
        };

        // Read under the claim: a call that finished just before we claimed is visible here.
        let existing = state.get(&req.asset_id);
        if let Some(r) = &existing {
            match r.status {
                DownloadStatus::Downloading => {
                    tracing::debug!(asset_id = %req.asset_id, "already downloading; deduplicated");
                    return Ok(r.local_path.clone());
                }
                DownloadStatus::Completed => {
                    if tokio::fs::try_exists(&r.local_path).await.unwrap_or(false) {
                        return Ok(r.local_path.clone());
                    }
                    tracing::warn!(
                        asset_id = %req.asset_id,
                        path = %r.local_path.display(),
                        "completed asset missing on disk; downloading again"
                    );
                }
                _ => {}
            }
        }

        let (record_id, dest) = {
            let _placement = self.inner.placement.lock().await;
            let dest = self.free_destination(&req, existing.as_ref()).await;
            let record = DownloadRecord::pending(
                req.asset_id.clone(),
                req.title.clone(),
                req.source_url.clone(),
                req.genre.clone(),
                dest.clone(),
            );
            let record_id = record.record_id;
            if existing.is_some() || !state.upsert(record.clone()) {
                state.supersede(record);
            }
            (record_id, dest)
        };

        let _permit = self
            .inner
            .slots
            .acquire()
            .await
            .map_err(|e| MaterializeError::Task(e.to_string()))?;

        state.transition(record_id, DownloadStatus::Downloading, TransitionFields::default())?;
        tracing::info!(asset_id = %req.asset_id, path = %dest.display(), "transfer started");

        match self.transfer(&req, record_id, &dest).await {
            Ok(path) => Ok(path),
            Err(e) => {
                let message = e.record_message();
                if let Err(state_err) = state.fail(record_id, message.clone()) {
                    tracing::debug!(asset_id = %req.asset_id, "could not record failure: {}", state_err);
                }
                tracing::warn!(asset_id = %req.asset_id, "materialization failed: {}", message);
                Err(e)
            }
        }
    }

    /// First of `dest`, `dest (2)`, ... that no other asset's record points at and
    /// that is not an unrelated file already on disk. `own` is the asset's current
    /// record, whose path may be reused.
    async fn free_destination(&self, req: &MaterializeRequest, own: Option<&DownloadRecord>) -> PathBuf {
        let base = self.destination_for(req);
        let taken: Vec<PathBuf> = self
            .inner
            .state
            .all()
            .into_iter()
            .filter(|r| r.asset_id != req.asset_id)
            .map(|r| r.local_path)
            .collect();
        let own_path = own.map(|r| r.local_path.as_path());

        let mut n = 1;
        loop {
            let candidate = library::numbered(&base, n);
            let foreign_file = own_path != Some(candidate.as_path())
                && tokio::fs::try_exists(&candidate).await.unwrap_or(false);
            if !taken.contains(&candidate) && !foreign_file {
                if n > 1 {
                    tracing::debug!(
                        asset_id = %req.asset_id,
                        path = %candidate.display(),
                        "destination taken by another asset; using numbered name"
                    );
                }
                return candidate;
            }
            n += 1;
        }
    }

    fn destination_for(&self, req: &MaterializeRequest) -> PathBuf {
        library::destination(
            &self.inner.library_root,
            &req.title,
            req.genre.as_deref(),
            &req.source_url,
        )
    }

    /// Runs with the record in `Downloading`; the caller records any error.
    async fn transfer(
        &self,
        req: &MaterializeRequest,
        record_id: RecordId,
        dest: &Path,
    ) -> Result<PathBuf, MaterializeError> {
        let state = &self.inner.state;

        if let Some(dir) = dest.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| MaterializeError::DestinationWriteFailure {
                    path: dir.to_path_buf(),
                    message: format!("create directory {}: {}", dir.display(), e),
                })?;
        }

        let (progress_tx, progress_rx) = mpsc::channel(16);
        let progress_handle = tokio::spawn(run_progress_loop(progress_rx, state.clone(), record_id));
        let throttle = ProgressThrottle::new(progress_tx, self.inner.progress_interval);

        let result = run_transfer(
            Arc::clone(&self.inner.source),
            req.source_url.clone(),
            dest.to_path_buf(),
            throttle,
        )
        .await;
        let _ = progress_handle.await;

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(TransferJobError::Transfer(source))) => {
                return Err(MaterializeError::TransferFailure {
                    asset_id: req.asset_id.clone(),
                    source,
                })
            }
            Ok(Err(TransferJobError::Destination(e))) => {
                return Err(MaterializeError::DestinationWriteFailure {
                    path: dest.to_path_buf(),
                    message: format!("{:#}", e),
                })
            }
            Err(join) => return Err(MaterializeError::Task(join.to_string())),
        };

        if outcome.final_path != dest {
            tracing::debug!(
                asset_id = %req.asset_id,
                content_type = ?outcome.head.content_type,
                path = %outcome.final_path.display(),
                "content type differs from URL extension; correcting path"
            );
            state.correct_local_path(record_id, outcome.final_path.clone())?;
        }

        if !tokio::fs::try_exists(&outcome.final_path).await.unwrap_or(false) {
            return Err(MaterializeError::DestinationWriteFailure {
                path: outcome.final_path.clone(),
                message: format!("{} missing after finalize", outcome.final_path.display()),
            });
        }

        state.update_progress(record_id, outcome.bytes, outcome.head.content_length.or(Some(outcome.bytes)))?;
        match state.complete(record_id) {
            Ok(_) => {
                tracing::info!(
                    asset_id = %req.asset_id,
                    bytes = outcome.bytes,
                    path = %outcome.final_path.display(),
                    "asset materialized"
                );
                Ok(outcome.final_path)
            }
            Err(e) => match state.get_by_record(record_id) {
                Some(r) if r.status != DownloadStatus::Downloading => {
                    Err(MaterializeError::Interrupted {
                        asset_id: req.asset_id.clone(),
                        status: r.status,
                    })
                }
                _ => Err(e.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests;
