//! `assetdrop export <asset_id>...` – run the drag protocol against the logging bridge.

use anyhow::Result;
use assetdrop_core::gate::{DragDecision, LoggingBridge};
use assetdrop_core::AssetDrop;

pub async fn run_export(app: &AssetDrop, bridge: &LoggingBridge, asset_ids: &[String]) -> Result<()> {
    for asset_id in asset_ids {
        app.prepare(asset_id, true).await?;
    }

    let decision = match asset_ids {
        [single] => {
            let handlers = app.drag_handlers(single, true);
            handlers.on_pointer_down();
            let decision = handlers.on_drag_start();
            handlers.on_drag_end();
            decision
        }
        many => {
            let items: Vec<(&str, bool)> = many.iter().map(|id| (id.as_str(), true)).collect();
            let decision = app.gate().commit_batch(&items);
            app.gate().drag_end();
            decision
        }
    };

    match decision {
        DragDecision::Proceed => {
            for path in bridge.exports().into_iter().flatten() {
                println!("{}", path.display());
            }
        }
        DragDecision::Suppress => println!("Not ready: download first."),
    }
    Ok(())
}
