//! `assetdrop ready <asset_id>` – resolve drag readiness.

use anyhow::Result;
use assetdrop_core::gate::Resolution;
use assetdrop_core::AssetDrop;

pub async fn run_ready(app: &AssetDrop, asset_id: &str) -> Result<()> {
    match app.prepare(asset_id, true).await? {
        Resolution::Ready(path) => println!("{asset_id}: ready ({})", path.display()),
        Resolution::NotDownloaded => println!("{asset_id}: not downloaded"),
        Resolution::NotOwned => println!("{asset_id}: not owned"),
        Resolution::Missing => println!("{asset_id}: file missing"),
    }
    Ok(())
}
