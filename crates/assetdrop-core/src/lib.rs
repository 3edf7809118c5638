pub mod config;
pub mod logging;

pub mod facade;
pub mod gate;
pub mod library;
pub mod orchestrator;
pub mod reconcile;
pub mod record;
pub mod record_store;
pub mod state;
pub mod storage;
pub mod transfer;

pub use config::AssetDropConfig;
pub use facade::AssetDrop;
pub use gate::{DragBridge, DragDecision, DragHandlers, ExportGate, LoggingBridge, Resolution};
pub use orchestrator::{MaterializeError, MaterializeRequest, Orchestrator};
pub use reconcile::{ReconcileReport, Reconciled, Reconciler};
pub use record::{AssetId, DownloadRecord, DownloadStatus, RecordId};
pub use record_store::RecordStore;
pub use state::{DownloadState, StateError, StateEvent};
pub use transfer::{CurlSource, TransferError, TransferSource};
