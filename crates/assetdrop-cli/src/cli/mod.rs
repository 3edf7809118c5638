//! CLI for assetdrop: materialize owned assets and try drag exports from a terminal.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use assetdrop_core::config;
use assetdrop_core::gate::LoggingBridge;
use assetdrop_core::transfer::CurlSource;
use assetdrop_core::AssetDrop;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

use commands::{
    run_completions, run_export, run_get, run_ready, run_remove, run_resume, run_status,
};

/// Top-level CLI for assetdrop.
#[derive(Debug, Parser)]
#[command(name = "assetdrop")]
#[command(about = "assetdrop: download owned audio assets and export them as native files", long_about = None)]
pub struct Cli {
    /// Library root (overrides `library_root` in config.toml).
    #[arg(long, global = true, value_name = "DIR")]
    pub library: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download an owned asset into the library (no-op if already there).
    Get {
        /// Catalog asset identifier.
        asset_id: String,
        /// Asset title; becomes the file name.
        title: String,
        /// Source URL of the asset bytes.
        url: String,
        /// Genre; becomes the library subdirectory.
        #[arg(long)]
        genre: Option<String>,
    },

    /// Show all download records.
    Status,

    /// Check whether an asset is ready to drag (re-downloads a missing file).
    Ready {
        asset_id: String,
    },

    /// Drag-export one or more assets through the logging bridge.
    Export {
        #[arg(required = true)]
        asset_ids: Vec<String>,
    },

    /// Restart a paused or failed asset.
    Resume {
        asset_id: String,
    },

    /// Forget an asset's record.
    Remove {
        asset_id: String,
        /// Also delete the downloaded file.
        #[arg(long)]
        delete_file: bool,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::Completions { shell } = cli.command {
            run_completions(shell);
            return Ok(());
        }

        let mut cfg = config::load_or_init()?;
        if let Some(root) = cli.library {
            cfg.library_root = Some(root);
        }
        tracing::debug!("loaded config: {:?}", cfg);

        let source = Arc::new(CurlSource::new(cfg.transfer.clone()));
        let bridge = Arc::new(LoggingBridge::new());
        let app = AssetDrop::open(cfg, source, bridge.clone()).await?;

        match cli.command {
            CliCommand::Get {
                asset_id,
                title,
                url,
                genre,
            } => run_get(&app, asset_id, title, url, genre).await?,
            CliCommand::Status => run_status(&app),
            CliCommand::Ready { asset_id } => run_ready(&app, &asset_id).await?,
            CliCommand::Export { asset_ids } => run_export(&app, &bridge, &asset_ids).await?,
            CliCommand::Resume { asset_id } => run_resume(&app, &asset_id).await?,
            CliCommand::Remove {
                asset_id,
                delete_file,
            } => run_remove(&app, &asset_id, delete_file).await?,
            CliCommand::Completions { .. } => {}
        }

        app.flush().await
    }
}

#[cfg(test)]
mod tests;
