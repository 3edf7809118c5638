//! `assetdrop get <asset_id> <title> <url>` – materialize one asset.

use anyhow::Result;
use assetdrop_core::orchestrator::MaterializeRequest;
use assetdrop_core::AssetDrop;

pub async fn run_get(
    app: &AssetDrop,
    asset_id: String,
    title: String,
    url: String,
    genre: Option<String>,
) -> Result<()> {
    let path = app
        .materialize(MaterializeRequest::new(asset_id.clone(), title, url, genre))
        .await?;
    println!("{asset_id}: {}", path.display());
    Ok(())
}
