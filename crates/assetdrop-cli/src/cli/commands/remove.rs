//! `assetdrop remove <asset_id>` – forget a record; optionally delete its file with --delete-file.

use anyhow::Result;
use assetdrop_core::AssetDrop;

pub async fn run_remove(app: &AssetDrop, asset_id: &str, delete_file: bool) -> Result<()> {
    let Some(record) = app.state().remove(asset_id) else {
        println!("No record for {asset_id}");
        return Ok(());
    };
    if delete_file {
        let path = &record.local_path;
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "deleted file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), "could not delete file: {}", e),
        }
    }
    println!("Removed {asset_id}");
    Ok(())
}
