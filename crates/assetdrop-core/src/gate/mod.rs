//! Native export gate: decides synchronously whether a drag may export a file.
//!
//! All I/O happens in [`ExportGate::resolve`], ahead of the gesture. The drag path
//! (arm on pointer-down, commit on drag-start, cleanup on drag-end) only reads the
//! readiness cache, never awaits and never fails: anything uncertain is treated as
//! not ready. The cache is subscribed to the state container before the gate is
//! handed out, and every state change for an asset invalidates its entry.

mod bridge;
mod handlers;
mod readiness;
mod signal;

pub use bridge::{BridgeError, DragBridge, LoggingBridge};
pub use handlers::DragHandlers;
pub use readiness::Readiness;
pub use signal::{NotReadySignal, SignalScope};

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::config::AssetDropConfig;
use crate::record::{AssetId, DownloadStatus};
use crate::state::{DownloadState, SubscriptionId};

use self::readiness::ReadinessCache;
use self::signal::SignalBoard;

/// Outcome of the commit phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragDecision {
    /// Let the native drag proceed; the bridge has the payload.
    Proceed,
    /// Prevent the native default; a `NotReady` signal was raised.
    Suppress,
}

impl DragDecision {
    pub fn is_proceed(self) -> bool {
        self == DragDecision::Proceed
    }
}

/// Result of an async readiness resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready(PathBuf),
    NotOwned,
    /// No record, or the record is not `Completed`.
    NotDownloaded,
    /// The record was `Completed` but its file is gone; it has been demoted.
    Missing,
}

#[derive(Debug, Default)]
struct DragSession {
    armed: Option<(AssetId, PathBuf)>,
    dragging: bool,
}

struct GateInner {
    state: DownloadState,
    bridge: Arc<dyn DragBridge>,
    cache: Arc<ReadinessCache>,
    signals: SignalBoard,
    session: Mutex<DragSession>,
    subscription: SubscriptionId,
}

impl Drop for GateInner {
    fn drop(&mut self) {
        self.state.unsubscribe(self.subscription);
    }
}

/// Cloneable handle; clones share the cache, signals and drag session.
#[derive(Clone)]
pub struct ExportGate {
    inner: Arc<GateInner>,
}

impl ExportGate {
    /// Build a gate over `state`, subscribing its cache to state changes first.
    pub fn attach(state: DownloadState, bridge: Arc<dyn DragBridge>, config: &AssetDropConfig) -> Self {
        Self::with_signal_ttl(state, bridge, config.not_ready_signal())
    }

    pub fn with_signal_ttl(state: DownloadState, bridge: Arc<dyn DragBridge>, signal_ttl: Duration) -> Self {
        let cache = Arc::new(ReadinessCache::default());
        let subscription = {
            let cache = Arc::clone(&cache);
            state.subscribe(move |event| cache.invalidate(&event.asset_id))
        };
        Self {
            inner: Arc::new(GateInner {
                state,
                bridge,
                cache,
                signals: SignalBoard::new(signal_ttl),
                session: Mutex::new(DragSession::default()),
                subscription,
            }),
        }
    }

    /// Check ownership, status and file existence, and cache the answer.
    /// A completed record whose file is gone is demoted and reported as `Missing`.
    pub async fn resolve(&self, asset_id: &str, owned: bool) -> Resolution {
        let cache = &self.inner.cache;
        let generation = cache.begin_check(asset_id);

        if !owned {
            cache.finish(asset_id, generation, Readiness::NotReady);
            return Resolution::NotOwned;
        }

        let record = match self.inner.state.get(asset_id) {
            Some(r) if r.status == DownloadStatus::Completed => r,
            _ => {
                cache.finish(asset_id, generation, Readiness::NotReady);
                return Resolution::NotDownloaded;
            }
        };

        if tokio::fs::try_exists(&record.local_path).await.unwrap_or(false) {
            if !cache.finish(asset_id, generation, Readiness::Ready(record.local_path.clone())) {
                tracing::debug!(asset_id, "readiness changed during resolve; result discarded");
            }
            return Resolution::Ready(record.local_path);
        }

        // Demotion notifies the cache, which drops this check's generation.
        self.inner.state.demote_missing(asset_id);
        let generation = cache.begin_check(asset_id);
        cache.finish(asset_id, generation, Readiness::NotReady);
        Resolution::Missing
    }

    /// Synchronous readiness query; only a cached `Ready` counts.
    pub fn is_ready(&self, asset_id: &str) -> bool {
        self.inner.cache.ready_path(asset_id).is_some()
    }

    pub fn readiness(&self, asset_id: &str) -> Readiness {
        self.inner.cache.get(asset_id)
    }

    /// Arm: remember the ready path so commit has nothing left to look up.
    pub fn pointer_down(&self, asset_id: &str, owned: bool) {
        if !owned {
            return;
        }
        if let Some(path) = self.inner.cache.ready_path(asset_id) {
            tracing::debug!(asset_id, path = %path.display(), "drag armed");
            self.session().armed = Some((asset_id.to_string(), path));
        }
    }

    /// Commit: hand the file to the bridge if the asset is ready, otherwise
    /// suppress the drag and raise a `NotReady` signal for it.
    pub fn drag_start(&self, asset_id: &str, owned: bool) -> DragDecision {
        let ready = if owned {
            self.inner.cache.ready_path(asset_id)
        } else {
            None
        };
        let Some(cached) = ready else {
            return self.suppress(SignalScope::Asset(asset_id.to_string()));
        };

        let path = {
            let mut session = self.session();
            let path = match session.armed.take() {
                Some((armed_id, armed_path)) if armed_id == asset_id => armed_path,
                _ => cached,
            };
            session.dragging = true;
            path
        };

        match self.inner.bridge.export_file(&path) {
            Ok(()) => {
                tracing::debug!(asset_id, path = %path.display(), "drag committed");
                DragDecision::Proceed
            }
            Err(e) => {
                tracing::warn!(asset_id, "drag bridge failed: {}", e);
                self.session().dragging = false;
                self.suppress(SignalScope::Asset(asset_id.to_string()))
            }
        }
    }

    /// Commit for a multi-asset drag: exports every owned, ready asset. An empty
    /// set suppresses the gesture and raises one batch signal.
    pub fn commit_batch(&self, items: &[(&str, bool)]) -> DragDecision {
        let paths: Vec<PathBuf> = items
            .iter()
            .filter(|(_, owned)| *owned)
            .filter_map(|(asset_id, _)| self.inner.cache.ready_path(asset_id))
            .collect();
        if paths.is_empty() {
            return self.suppress(SignalScope::Batch);
        }

        self.session().dragging = true;
        match self.inner.bridge.export_files(&paths) {
            Ok(()) => {
                tracing::debug!(count = paths.len(), requested = items.len(), "batch drag committed");
                DragDecision::Proceed
            }
            Err(e) => {
                tracing::warn!("drag bridge failed for batch: {}", e);
                self.session().dragging = false;
                self.suppress(SignalScope::Batch)
            }
        }
    }

    /// Cleanup: clear the armed slot and the dragging flag. Idempotent.
    pub fn drag_end(&self) {
        let mut session = self.session();
        session.armed = None;
        session.dragging = false;
    }

    pub fn drag_handlers(&self, asset_id: impl Into<AssetId>, owned: bool) -> DragHandlers {
        DragHandlers::new(self.clone(), asset_id.into(), owned)
    }

    pub fn is_dragging(&self) -> bool {
        self.session().dragging
    }

    pub fn armed_path(&self) -> Option<PathBuf> {
        self.session().armed.as_ref().map(|(_, path)| path.clone())
    }

    /// The active `NotReady` signal for `scope`, if it has not expired.
    pub fn not_ready_signal(&self, scope: &SignalScope) -> Option<NotReadySignal> {
        self.inner.signals.active(scope)
    }

    pub fn active_signals(&self) -> Vec<NotReadySignal> {
        self.inner.signals.all_active()
    }

    fn suppress(&self, scope: SignalScope) -> DragDecision {
        tracing::debug!(?scope, "drag suppressed; asset not ready");
        self.inner.signals.raise(scope);
        DragDecision::Suppress
    }

    fn session(&self) -> std::sync::MutexGuard<'_, DragSession> {
        self.inner.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
