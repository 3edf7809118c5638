use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Transfer tuning (optional `[transfer]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Seconds allowed for connection setup.
    pub connect_timeout_secs: u64,
    /// Abort when throughput stays below this many bytes/s ...
    pub low_speed_limit_bytes: u32,
    /// ... for this many seconds.
    pub low_speed_time_secs: u64,
    /// Hard cap on one transfer, in seconds.
    pub timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
            timeout_secs: 3600,
        }
    }
}

/// Global configuration loaded from `~/.config/assetdrop/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDropConfig {
    /// Root of the local asset library. Defaults to `~/.local/share/assetdrop/library`.
    #[serde(default)]
    pub library_root: Option<PathBuf>,
    /// Maximum number of transfers running at once; extra requests wait in `Pending`.
    pub max_concurrent_transfers: usize,
    /// How long a "download first" signal stays visible after a refused drag.
    pub not_ready_signal_ms: u64,
    /// Minimum interval between progress updates pushed into the state container.
    pub progress_interval_ms: u64,
    #[serde(default)]
    pub transfer: TransferConfig,
}

impl Default for AssetDropConfig {
    fn default() -> Self {
        Self {
            library_root: None,
            max_concurrent_transfers: 3,
            not_ready_signal_ms: 2000,
            progress_interval_ms: 250,
            transfer: TransferConfig::default(),
        }
    }
}

impl AssetDropConfig {
    /// Configured library root, or the XDG data default.
    pub fn library_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.library_root {
            return Ok(root.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("assetdrop")?;
        Ok(xdg_dirs.get_data_home().join("assetdrop").join("library"))
    }

    pub fn max_concurrent_transfers(&self) -> usize {
        self.max_concurrent_transfers.max(1)
    }

    pub fn not_ready_signal(&self) -> Duration {
        Duration::from_millis(self.not_ready_signal_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("assetdrop")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<AssetDropConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = AssetDropConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: AssetDropConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
