//! Versioned on-disk representation of records.
//!
//! The snapshot is a JSON array of entries, each tagged with `schema`. Entries are
//! validated one by one so a single malformed or future-version entry does not
//! discard the rest. Unknown fields are ignored.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::{DownloadRecord, DownloadStatus, RecordId};

/// Current schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub schema: u32,
    pub record_id: u64,
    pub asset_id: String,
    pub title: String,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    pub local_path: PathBuf,
    #[serde(default)]
    pub path_corrected: bool,
    pub status: DownloadStatus,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub downloaded_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl From<&DownloadRecord> for PersistedRecord {
    fn from(r: &DownloadRecord) -> Self {
        Self {
            schema: SCHEMA_VERSION,
            record_id: r.record_id.as_u64(),
            asset_id: r.asset_id.clone(),
            title: r.title.clone(),
            source_url: r.source_url.clone(),
            genre: r.genre.clone(),
            local_path: r.local_path.clone(),
            path_corrected: r.path_corrected,
            status: r.status,
            progress_percent: r.progress_percent,
            downloaded_bytes: r.downloaded_bytes,
            total_bytes: r.total_bytes,
            error_message: r.error_message.clone(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl PersistedRecord {
    /// Validate and convert into an in-memory record. Returns `None` for entries
    /// that cannot be trusted.
    fn into_record(self) -> Option<DownloadRecord> {
        if self.schema != SCHEMA_VERSION {
            return None;
        }
        if self.asset_id.trim().is_empty() || self.local_path.as_os_str().is_empty() {
            return None;
        }
        if self.progress_percent > 100 {
            return None;
        }
        Some(DownloadRecord {
            record_id: RecordId::from_raw(self.record_id),
            asset_id: self.asset_id,
            title: self.title,
            source_url: self.source_url,
            genre: self.genre,
            local_path: self.local_path,
            path_corrected: self.path_corrected,
            status: self.status,
            progress_percent: self.progress_percent,
            downloaded_bytes: self.downloaded_bytes,
            total_bytes: self.total_bytes,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Serialize records (in order) to the snapshot JSON.
pub fn encode_snapshot(records: &[DownloadRecord]) -> Result<String> {
    let entries: Vec<PersistedRecord> = records.iter().map(PersistedRecord::from).collect();
    serde_json::to_string(&entries).context("serialize download snapshot")
}

/// Parse a snapshot. Returns valid records in order plus the number of entries dropped.
/// Fails only if the document itself is not a JSON array.
pub fn decode_snapshot(json: &str) -> Result<(Vec<DownloadRecord>, usize)> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(json).context("parse download snapshot")?;
    let mut records = Vec::with_capacity(entries.len());
    let mut dropped = 0usize;
    for entry in entries {
        match serde_json::from_value::<PersistedRecord>(entry)
            .ok()
            .and_then(PersistedRecord::into_record)
        {
            Some(r) => records.push(r),
            None => dropped += 1,
        }
    }
    Ok((records, dropped))
}
