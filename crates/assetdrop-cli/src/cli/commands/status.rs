//! `assetdrop status` – show all download records.

use assetdrop_core::record::DownloadRecord;
use assetdrop_core::AssetDrop;

fn progress_column(r: &DownloadRecord) -> String {
    match r.total_bytes {
        Some(total) => format!("{}% of {}", r.progress_percent, total),
        None => format!("{}%", r.progress_percent),
    }
}

pub fn run_status(app: &AssetDrop) {
    let records = app.state().all();
    if records.is_empty() {
        println!("No downloads recorded.");
        return;
    }
    println!("{:<16} {:<12} {:<16} {}", "ASSET", "STATUS", "PROGRESS", "PATH");
    for r in records {
        println!(
            "{:<16} {:<12} {:<16} {}",
            r.asset_id,
            r.status,
            progress_column(&r),
            r.local_path.display()
        );
        if let Some(msg) = &r.error_message {
            println!("{:<16} error: {}", "", msg);
        }
    }
}
