//! Orchestrator tests with an in-process transfer source.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;

use crate::record::DownloadStatus;
use crate::state::DownloadState;
use crate::storage::temp_path;
use crate::transfer::{ResponseHead, TransferError, TransferSink, TransferSource};

use super::{MaterializeError, MaterializeRequest, Orchestrator};

/// Serves a fixed body (or the requested URL itself) in small chunks. With a
/// hold channel, each fetch blocks until one release message arrives.
struct FakeSource {
    body: Vec<u8>,
    echo_url: bool,
    content_type: Option<String>,
    fail_with: Mutex<Option<TransferError>>,
    hold: Option<Mutex<std_mpsc::Receiver<()>>>,
    calls: AtomicUsize,
}

impl FakeSource {
    fn new(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            echo_url: false,
            content_type: None,
            fail_with: Mutex::new(None),
            hold: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn held(body: &[u8]) -> (Self, std_mpsc::Sender<()>) {
        let (tx, rx) = std_mpsc::channel();
        let mut source = Self::new(body);
        source.hold = Some(Mutex::new(rx));
        (source, tx)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TransferSource for FakeSource {
    fn fetch(&self, url: &str, sink: &mut dyn TransferSink) -> Result<ResponseHead, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hold) = &self.hold {
            let _ = hold.lock().unwrap().recv();
        }
        if let Some(e) = self.fail_with.lock().unwrap().take() {
            return Err(e);
        }
        let body = if self.echo_url {
            url.as_bytes()
        } else {
            &self.body[..]
        };
        let head = ResponseHead {
            status: 200,
            content_length: Some(body.len() as u64),
            content_type: self.content_type.clone(),
        };
        sink.begin(&head);
        for chunk in body.chunks(4) {
            sink.write(chunk).map_err(TransferError::Sink)?;
        }
        Ok(head)
    }
}

fn orchestrator(root: &Path, source: Arc<FakeSource>, slots: usize) -> Orchestrator {
    Orchestrator::new(
        DownloadState::in_memory(),
        source,
        root.to_path_buf(),
        slots,
        Duration::ZERO,
    )
}

fn kick() -> MaterializeRequest {
    MaterializeRequest::new(
        "a1",
        "Kick 01",
        "https://cdn.example.com/a1/kick.wav",
        Some("Trap".to_string()),
    )
}

async fn wait_for_status(state: &DownloadState, asset: &str, status: DownloadStatus) {
    for _ in 0..200 {
        if state.get(asset).map(|r| r.status) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{asset} never reached {status}");
}

#[tokio::test]
async fn materialize_writes_file_and_completes() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeSource::new(b"RIFF....WAVEfmt "));
    let orch = orchestrator(dir.path(), Arc::clone(&source), 3);

    let path = orch.materialize(kick()).await.unwrap();

    assert_eq!(path, dir.path().join("Trap").join("Kick 01.wav"));
    assert_eq!(std::fs::read(&path).unwrap(), b"RIFF....WAVEfmt ");
    assert!(!temp_path(&path).exists());
    let record = orch.state().get("a1").unwrap();
    assert_eq!(record.status, DownloadStatus::Completed);
    assert_eq!(record.progress_percent, 100);
    assert_eq!(record.downloaded_bytes, 16);
    assert_eq!(record.total_bytes, Some(16));
    assert!(!orch.is_in_flight("a1"));
}

#[tokio::test]
async fn concurrent_calls_while_downloading_share_one_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let (source, release) = FakeSource::held(b"body");
    let source = Arc::new(source);
    let orch = orchestrator(dir.path(), Arc::clone(&source), 3);

    let first = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.materialize(kick()).await })
    };
    wait_for_status(orch.state(), "a1", DownloadStatus::Downloading).await;

    let second = orch.materialize(kick()).await.unwrap();
    let third = orch.materialize(kick()).await.unwrap();
    assert_eq!(second, third);
    assert_eq!(orch.state().get("a1").unwrap().status, DownloadStatus::Downloading);

    release.send(()).unwrap();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(source.calls(), 1, "exactly one transfer");
}

#[tokio::test]
async fn completed_asset_with_file_is_returned_without_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeSource::new(b"data"));
    let orch = orchestrator(dir.path(), Arc::clone(&source), 3);

    let first = orch.materialize(kick()).await.unwrap();
    let record_id = orch.state().get("a1").unwrap().record_id;
    let again = orch.materialize(kick()).await.unwrap();

    assert_eq!(first, again);
    assert_eq!(source.calls(), 1);
    assert_eq!(orch.state().get("a1").unwrap().record_id, record_id);
}

#[tokio::test]
async fn completed_asset_with_missing_file_downloads_again() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeSource::new(b"data"));
    let orch = orchestrator(dir.path(), Arc::clone(&source), 3);

    let path = orch.materialize(kick()).await.unwrap();
    let old_id = orch.state().get("a1").unwrap().record_id;
    std::fs::remove_file(&path).unwrap();

    let again = orch.materialize(kick()).await.unwrap();
    assert_eq!(again, path);
    assert!(again.exists());
    assert_eq!(source.calls(), 2);
    let record = orch.state().get("a1").unwrap();
    assert_ne!(record.record_id, old_id);
    assert_eq!(record.status, DownloadStatus::Completed);
    assert_eq!(orch.state().len(), 1);
}

#[tokio::test]
async fn transfer_failure_is_recorded_and_returned_without_retry() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeSource::new(b"data"));
    *source.fail_with.lock().unwrap() = Some(TransferError::Http(404));
    let orch = orchestrator(dir.path(), Arc::clone(&source), 3);

    let err = orch.materialize(kick()).await.unwrap_err();
    assert!(matches!(err, MaterializeError::TransferFailure { .. }), "{err:?}");
    assert_eq!(source.calls(), 1);

    let record = orch.state().get("a1").unwrap();
    assert_eq!(record.status, DownloadStatus::Error);
    assert_eq!(record.error_message.as_deref(), Some("HTTP 404"));
    assert!(!temp_path(&record.local_path).exists());
    assert!(!record.local_path.exists());

    // A retry is a new call and a new attempt.
    let path = orch.materialize(kick()).await.unwrap();
    assert!(path.exists());
    let retried = orch.state().get("a1").unwrap();
    assert_ne!(retried.record_id, record.record_id);
    assert_eq!(retried.status, DownloadStatus::Completed);
    assert!(retried.error_message.is_none());
}

#[tokio::test]
async fn unwritable_destination_is_a_destination_failure() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("not-a-dir");
    std::fs::write(&root, b"file in the way").unwrap();
    let source = Arc::new(FakeSource::new(b"data"));
    let orch = orchestrator(&root, Arc::clone(&source), 3);

    let err = orch.materialize(kick()).await.unwrap_err();
    assert!(matches!(err, MaterializeError::DestinationWriteFailure { .. }), "{err:?}");
    let record = orch.state().get("a1").unwrap();
    assert_eq!(record.status, DownloadStatus::Error);
    assert!(record.error_message.is_some());
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn content_type_corrects_extension_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = FakeSource::new(b"ID3data");
    source.content_type = Some("audio/mpeg".to_string());
    let orch = orchestrator(dir.path(), Arc::new(source), 3);

    let path = orch.materialize(kick()).await.unwrap();

    assert_eq!(path, dir.path().join("Trap").join("Kick 01.mp3"));
    assert!(path.exists());
    assert!(!dir.path().join("Trap").join("Kick 01.wav").exists());
    let record = orch.state().get("a1").unwrap();
    assert_eq!(record.local_path, path);
    assert!(record.path_corrected);
    assert_eq!(record.status, DownloadStatus::Completed);
}

#[tokio::test]
async fn concurrency_cap_queues_extra_requests_in_pending() {
    let dir = tempfile::tempdir().unwrap();
    let (source, release) = FakeSource::held(b"data");
    let source = Arc::new(source);
    let orch = orchestrator(dir.path(), Arc::clone(&source), 1);

    let first = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.materialize(kick()).await })
    };
    wait_for_status(orch.state(), "a1", DownloadStatus::Downloading).await;

    let second = {
        let orch = orch.clone();
        tokio::spawn(async move {
            orch.materialize(MaterializeRequest::new(
                "a2",
                "Snare 02",
                "https://cdn.example.com/a2/snare.wav",
                None,
            ))
            .await
        })
    };
    wait_for_status(orch.state(), "a2", DownloadStatus::Pending).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(orch.state().get("a2").unwrap().status, DownloadStatus::Pending);
    assert_eq!(source.calls(), 1);

    // A queued asset is in flight too: no second attempt is created for it.
    let queued_path = orch
        .materialize(MaterializeRequest::new(
            "a2",
            "Snare 02",
            "https://cdn.example.com/a2/snare.wav",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(queued_path, dir.path().join("Uncategorized").join("Snare 02.wav"));

    release.send(()).unwrap();
    first.await.unwrap().unwrap();
    wait_for_status(orch.state(), "a2", DownloadStatus::Downloading).await;
    release.send(()).unwrap();
    let second = second.await.unwrap().unwrap();

    assert_eq!(second, queued_path);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn pause_during_transfer_leaves_record_paused() {
    let dir = tempfile::tempdir().unwrap();
    let (source, release) = FakeSource::held(b"data");
    let orch = orchestrator(dir.path(), Arc::new(source), 1);

    let task = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.materialize(kick()).await })
    };
    wait_for_status(orch.state(), "a1", DownloadStatus::Downloading).await;
    let record_id = orch.state().get("a1").unwrap().record_id;
    orch.state().pause(record_id).unwrap();

    release.send(()).unwrap();
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        MaterializeError::Interrupted {
            status: DownloadStatus::Paused,
            ..
        }
    ));
    assert_eq!(orch.state().get("a1").unwrap().status, DownloadStatus::Paused);
}

#[tokio::test]
async fn paused_record_restarts_from_pending_on_materialize() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeSource::new(b"data"));
    let orch = orchestrator(dir.path(), Arc::clone(&source), 1);
    let state = orch.state().clone();

    let mut paused = crate::record::DownloadRecord::pending(
        "a1",
        "Kick 01",
        "https://cdn.example.com/a1/kick.wav",
        Some("Trap".to_string()),
        PathBuf::from("/elsewhere/Kick 01.wav"),
    );
    paused.status = DownloadStatus::Paused;
    state.upsert(paused);

    let path = orch.materialize(kick()).await.unwrap();
    assert_eq!(path, dir.path().join("Trap").join("Kick 01.wav"));
    assert_eq!(state.get("a1").unwrap().status, DownloadStatus::Completed);
    assert_eq!(source.calls(), 1);
}

fn echo_source() -> FakeSource {
    let mut source = FakeSource::new(b"");
    source.echo_url = true;
    source
}

fn kick_from(asset_id: &str, url: &str) -> MaterializeRequest {
    MaterializeRequest::new(asset_id, "Kick 01", url, Some("Trap".to_string()))
}

#[tokio::test]
async fn same_title_for_different_assets_gets_numbered_file() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), Arc::new(echo_source()), 3);

    let p1 = orch.materialize(kick_from("a1", "https://cdn/one/kick.wav")).await.unwrap();
    let p2 = orch.materialize(kick_from("a2", "https://cdn/two/kick.wav")).await.unwrap();

    assert_eq!(p1, dir.path().join("Trap").join("Kick 01.wav"));
    assert_eq!(p2, dir.path().join("Trap").join("Kick 01 (2).wav"));
    assert_eq!(std::fs::read(&p1).unwrap(), b"https://cdn/one/kick.wav");
    assert_eq!(std::fs::read(&p2).unwrap(), b"https://cdn/two/kick.wav");
    assert_eq!(orch.state().get("a1").unwrap().local_path, p1);
    assert_eq!(orch.state().get("a2").unwrap().local_path, p2);

    // Re-materializing either asset keeps its own file.
    std::fs::remove_file(&p2).unwrap();
    assert_eq!(orch.materialize(kick_from("a2", "https://cdn/two/kick.wav")).await.unwrap(), p2);
    assert_eq!(std::fs::read(&p1).unwrap(), b"https://cdn/one/kick.wav");
}

#[tokio::test]
async fn concurrent_assets_with_same_title_write_separate_files() {
    let dir = tempfile::tempdir().unwrap();
    let (mut source, release) = FakeSource::held(b"");
    source.echo_url = true;
    let orch = orchestrator(dir.path(), Arc::new(source), 2);

    let tasks: Vec<_> = ["a1", "a2"]
        .into_iter()
        .map(|id| {
            let orch = orch.clone();
            let url = format!("https://cdn/{id}/kick.wav");
            tokio::spawn(async move { orch.materialize(kick_from(id, &url)).await })
        })
        .collect();
    wait_for_status(orch.state(), "a1", DownloadStatus::Downloading).await;
    wait_for_status(orch.state(), "a2", DownloadStatus::Downloading).await;
    let p1 = orch.state().get("a1").unwrap().local_path;
    let p2 = orch.state().get("a2").unwrap().local_path;
    assert_ne!(p1, p2);

    release.send(()).unwrap();
    release.send(()).unwrap();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(std::fs::read(&p1).unwrap(), b"https://cdn/a1/kick.wav");
    assert_eq!(std::fs::read(&p2).unwrap(), b"https://cdn/a2/kick.wav");
}

#[tokio::test]
async fn unrelated_file_at_destination_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let trap = dir.path().join("Trap");
    std::fs::create_dir_all(&trap).unwrap();
    std::fs::write(trap.join("Kick 01.wav"), b"user sample").unwrap();
    let orch = orchestrator(dir.path(), Arc::new(FakeSource::new(b"asset")), 3);

    let path = orch.materialize(kick()).await.unwrap();

    assert_eq!(path, trap.join("Kick 01 (2).wav"));
    assert_eq!(std::fs::read(trap.join("Kick 01.wav")).unwrap(), b"user sample");
    assert_eq!(std::fs::read(&path).unwrap(), b"asset");
}

#[tokio::test]
async fn extension_correction_never_overwrites_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let trap = dir.path().join("Trap");
    std::fs::create_dir_all(&trap).unwrap();
    std::fs::write(trap.join("Kick 01.mp3"), b"other asset").unwrap();
    let mut source = FakeSource::new(b"ID3data");
    source.content_type = Some("audio/mpeg".to_string());
    let orch = orchestrator(dir.path(), Arc::new(source), 3);

    let path = orch.materialize(kick()).await.unwrap();

    assert_eq!(path, trap.join("Kick 01.wav"));
    assert!(!orch.state().get("a1").unwrap().path_corrected);
    assert_eq!(std::fs::read(trap.join("Kick 01.mp3")).unwrap(), b"other asset");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn burst_of_calls_for_one_asset_transfers_once() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeSource::new(b"data"));
    let orch = orchestrator(dir.path(), Arc::clone(&source), 3);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let orch = orch.clone();
            tokio::spawn(async move { orch.materialize(kick()).await })
        })
        .collect();
    let mut paths = Vec::new();
    for task in tasks {
        paths.push(task.await.unwrap().unwrap());
    }

    let expected = dir.path().join("Trap").join("Kick 01.wav");
    assert!(paths.iter().all(|p| *p == expected));
    assert_eq!(source.calls(), 1);
    assert_eq!(orch.state().get("a1").unwrap().status, DownloadStatus::Completed);
}
