//! Background task that mirrors snapshots into the record store.
//!
//! The container enqueues full snapshots on an unbounded channel (never blocks the
//! caller); this loop is the store's only writer and writes just the latest snapshot
//! when several are queued.

use tokio::sync::{mpsc, oneshot};

use crate::record::DownloadRecord;
use crate::record_store::RecordStore;

pub(crate) enum PersistCommand {
    Snapshot(Vec<DownloadRecord>),
    Flush(oneshot::Sender<()>),
}

pub(crate) type PersistSender = mpsc::UnboundedSender<PersistCommand>;

/// Spawn the persistence loop on the current runtime.
pub(crate) fn spawn_persistence(store: RecordStore) -> (PersistSender, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_persistence_loop(rx, store));
    (tx, handle)
}

async fn run_persistence_loop(mut rx: mpsc::UnboundedReceiver<PersistCommand>, store: RecordStore) {
    while let Some(cmd) = rx.recv().await {
        let mut latest = None;
        let mut waiters = Vec::new();
        collect(cmd, &mut latest, &mut waiters);
        while let Ok(cmd) = rx.try_recv() {
            collect(cmd, &mut latest, &mut waiters);
        }

        if let Some(records) = latest {
            match store.save_snapshot(&records).await {
                Ok(()) => tracing::debug!(records = records.len(), "download snapshot persisted"),
                Err(e) => tracing::warn!("download snapshot write failed: {:#}", e),
            }
        }
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
    tracing::debug!("persistence loop stopped");
}

fn collect(
    cmd: PersistCommand,
    latest: &mut Option<Vec<DownloadRecord>>,
    waiters: &mut Vec<oneshot::Sender<()>>,
) {
    match cmd {
        PersistCommand::Snapshot(records) => *latest = Some(records),
        PersistCommand::Flush(tx) => waiters.push(tx),
    }
}
