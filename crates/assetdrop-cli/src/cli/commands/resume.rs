//! `assetdrop resume <asset_id>` – restart a paused or failed asset from zero.

use anyhow::{bail, Result};
use assetdrop_core::orchestrator::MaterializeRequest;
use assetdrop_core::record::DownloadStatus;
use assetdrop_core::AssetDrop;

pub async fn run_resume(app: &AssetDrop, asset_id: &str) -> Result<()> {
    let Some(record) = app.state().get(asset_id) else {
        bail!("no record for asset {asset_id}");
    };
    match record.status {
        DownloadStatus::Paused => {
            app.state().resume(record.record_id)?;
        }
        DownloadStatus::Error | DownloadStatus::Pending => {}
        DownloadStatus::Completed | DownloadStatus::Downloading => {
            println!("{asset_id}: already {}", record.status);
            return Ok(());
        }
    }
    let path = app.materialize(MaterializeRequest::from_record(&record)).await?;
    println!("{asset_id}: {}", path.display());
    Ok(())
}
