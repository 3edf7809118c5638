//! SQLite-backed key-value store implementation.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::{Path, PathBuf};

use crate::record::{decode_snapshot, encode_snapshot, DownloadRecord};
use crate::record::unix_timestamp;

/// Key under which the ordered download snapshot is stored.
pub const DOWNLOADS_KEY: &str = "downloads";

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the key-value database holding the persisted snapshot.
///
/// Stored under the XDG state directory: `~/.local/state/assetdrop/records.db`.
#[derive(Clone)]
pub struct RecordStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl RecordStore {
    /// Default database path under the XDG state directory.
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("assetdrop")?;
        Ok(xdg_dirs.get_state_home().join("assetdrop").join("records.db"))
    }

    /// Open (or create) the default database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(&path).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create state dir: {}", parent.display()))?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        // Single writer; one connection keeps writes strictly ordered.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&uri)
            .await
            .with_context(|| format!("open record store: {}", path.display()))?;
        let store = RecordStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Raw value for `key`, if present.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query(r#"SELECT value FROM kv WHERE key = ?1"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    /// Insert or replace the value for `key`.
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Load the download snapshot. Returns the valid records (in stored order) and
    /// the number of entries that were dropped as malformed. A missing key or a
    /// corrupt document yields an empty snapshot.
    pub async fn load_snapshot(&self) -> Result<(Vec<DownloadRecord>, usize)> {
        let Some(json) = self.get(DOWNLOADS_KEY).await? else {
            return Ok((Vec::new(), 0));
        };
        match decode_snapshot(&json) {
            Ok(decoded) => Ok(decoded),
            Err(e) => {
                tracing::warn!("discarding unreadable download snapshot: {:#}", e);
                Ok((Vec::new(), 0))
            }
        }
    }

    /// Replace the stored snapshot with `records`.
    pub async fn save_snapshot(&self, records: &[DownloadRecord]) -> Result<()> {
        let json = encode_snapshot(records)?;
        self.put(DOWNLOADS_KEY, &json).await
    }
}

#[cfg(test)]
/// Open an in-memory store for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<RecordStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let store = RecordStore { pool };
    store.migrate().await?;
    Ok(store)
}
