//! Download records: the unit of state shared by the container, the
//! orchestrator, the export gate and the persisted snapshot.

mod schema;
mod types;

pub use schema::{decode_snapshot, encode_snapshot, PersistedRecord, SCHEMA_VERSION};
pub use types::{
    progress_percent, AssetId, DownloadRecord, DownloadStatus, RecordId, TransitionFields,
};

pub(crate) use types::unix_timestamp;
