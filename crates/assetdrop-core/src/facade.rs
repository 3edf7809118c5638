//! Caller-facing API bundling the state container, orchestrator and export gate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use crate::config::AssetDropConfig;
use crate::gate::{DragBridge, DragHandlers, ExportGate, Resolution};
use crate::orchestrator::{MaterializeError, MaterializeRequest, Orchestrator};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::record_store::RecordStore;
use crate::state::DownloadState;
use crate::transfer::TransferSource;

pub struct AssetDrop {
    config: AssetDropConfig,
    state: DownloadState,
    orchestrator: Orchestrator,
    gate: ExportGate,
    report: ReconcileReport,
    _persistence: JoinHandle<()>,
}

impl AssetDrop {
    /// Open the default record store, reconcile it and wire everything up.
    pub async fn open(
        config: AssetDropConfig,
        source: Arc<dyn TransferSource>,
        bridge: Arc<dyn DragBridge>,
    ) -> Result<Self> {
        let store = RecordStore::open_default().await?;
        Self::open_with_store(config, store, source, bridge).await
    }

    pub async fn open_with_store(
        config: AssetDropConfig,
        store: RecordStore,
        source: Arc<dyn TransferSource>,
        bridge: Arc<dyn DragBridge>,
    ) -> Result<Self> {
        let reconciled = Reconciler::new(store).run().await?;
        let state = reconciled.state;
        let gate = ExportGate::attach(state.clone(), bridge, &config);
        let orchestrator = Orchestrator::from_config(&config, state.clone(), source)
            .context("resolve library root")?;
        Ok(Self {
            config,
            state,
            orchestrator,
            gate,
            report: reconciled.report,
            _persistence: reconciled.persistence,
        })
    }

    /// Materialize an owned asset and refresh its drag readiness.
    pub async fn materialize(&self, req: MaterializeRequest) -> Result<PathBuf, MaterializeError> {
        let asset_id = req.asset_id.clone();
        let path = self.orchestrator.materialize(req).await?;
        self.gate.resolve(&asset_id, true).await;
        Ok(path)
    }

    /// Synchronous drag readiness.
    pub fn is_ready(&self, asset_id: &str) -> bool {
        self.gate.is_ready(asset_id)
    }

    /// Resolve readiness ahead of a drag (hover/mount). If the asset's file has
    /// gone missing, it is downloaded again before resolving once more.
    pub async fn prepare(&self, asset_id: &str, owned: bool) -> Result<Resolution, MaterializeError> {
        let resolution = self.gate.resolve(asset_id, owned).await;
        if resolution != Resolution::Missing {
            return Ok(resolution);
        }
        let Some(record) = self.state.get(asset_id) else {
            return Ok(resolution);
        };
        tracing::warn!(asset_id, "integrity failure; materializing again");
        self.orchestrator
            .materialize(MaterializeRequest::from_record(&record))
            .await?;
        Ok(self.gate.resolve(asset_id, owned).await)
    }

    pub fn drag_handlers(&self, asset_id: &str, owned: bool) -> DragHandlers {
        self.gate.drag_handlers(asset_id, owned)
    }

    pub fn state(&self) -> &DownloadState {
        &self.state
    }

    pub fn gate(&self) -> &ExportGate {
        &self.gate
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn config(&self) -> &AssetDropConfig {
        &self.config
    }

    /// What startup reconciliation did.
    pub fn reconcile_report(&self) -> ReconcileReport {
        self.report
    }

    /// Wait for pending snapshot writes.
    pub async fn flush(&self) -> Result<()> {
        self.state.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::LoggingBridge;
    use crate::record::DownloadStatus;
    use crate::transfer::{ResponseHead, TransferError, TransferSink};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSource {
        calls: AtomicUsize,
    }

    impl TransferSource for StaticSource {
        fn fetch(&self, _url: &str, sink: &mut dyn TransferSink) -> Result<ResponseHead, TransferError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let head = ResponseHead {
                status: 200,
                content_length: Some(8),
                content_type: Some("audio/wav".to_string()),
            };
            sink.begin(&head);
            sink.write(b"RIFFWAVE").map_err(TransferError::Sink)?;
            Ok(head)
        }
    }

    async fn open(dir: &std::path::Path) -> (AssetDrop, Arc<StaticSource>, Arc<LoggingBridge>) {
        let config = AssetDropConfig {
            library_root: Some(dir.join("library")),
            ..AssetDropConfig::default()
        };
        let store = RecordStore::open_at(dir.join("records.db")).await.unwrap();
        let source = Arc::new(StaticSource {
            calls: AtomicUsize::new(0),
        });
        let bridge = Arc::new(LoggingBridge::new());
        let app = AssetDrop::open_with_store(config, store, source.clone(), bridge.clone())
            .await
            .unwrap();
        (app, source, bridge)
    }

    #[tokio::test]
    async fn materialize_then_drag_exports_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _source, bridge) = open(dir.path()).await;

        let path = app
            .materialize(MaterializeRequest::new(
                "a1",
                "Kick 01",
                "https://cdn.example.com/a1/kick.wav",
                Some("Trap".to_string()),
            ))
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("library").join("Trap").join("Kick 01.wav"));
        assert!(app.is_ready("a1"));
        let handlers = app.drag_handlers("a1", true);
        handlers.on_pointer_down();
        assert!(handlers.on_drag_start().is_proceed());
        handlers.on_drag_end();
        assert_eq!(bridge.exports(), vec![vec![path]]);
    }

    #[tokio::test]
    async fn prepare_rematerializes_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (app, source, _bridge) = open(dir.path()).await;
        let path = app
            .materialize(MaterializeRequest::new("a1", "Kick 01", "https://cdn.example.com/k.wav", None))
            .await
            .unwrap();
        std::fs::remove_file(&path).unwrap();

        let resolution = app.prepare("a1", true).await.unwrap();

        assert_eq!(resolution, Resolution::Ready(path.clone()));
        assert!(path.exists());
        assert!(app.is_ready("a1"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(app.state().get("a1").unwrap().status, DownloadStatus::Completed);
    }

    #[tokio::test]
    async fn prepare_unknown_asset_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let (app, source, _bridge) = open(dir.path()).await;
        assert_eq!(app.prepare("nope", true).await.unwrap(), Resolution::NotDownloaded);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(app.reconcile_report(), ReconcileReport::default());
    }
}
