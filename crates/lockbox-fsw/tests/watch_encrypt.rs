//! Watcher integration tests against a real filesystem and the platform
//! event source.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lockbox_core::config::WatcherConfig;
use lockbox_core::{Algorithm, FileProcessor, NullSink};
use lockbox_fsw::{DirWatcher, WatchError};
use tempfile::TempDir;

const KEY: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
    0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];

fn test_config(watch: &Path, out: &Path) -> WatcherConfig {
    WatcherConfig {
        watch_dir: watch.to_path_buf(),
        output_dir: out.to_path_buf(),
        settle_delay_ms: 50,
        event_capacity: 100,
    }
}

async fn wait_for(path: &Path, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn new_file_is_encrypted_once() {
    let watch = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let (watcher, mut events) = DirWatcher::new(
        &test_config(watch.path(), out.path()),
        Algorithm::LeaPcbc,
        KEY.to_vec(),
        Arc::new(NullSink),
    )
    .unwrap();
    watcher.start().unwrap();

    let payload: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(watch.path().join("a.bin"), &payload).unwrap();

    let encrypted = out.path().join("a.bin.enc");
    assert!(
        wait_for(&encrypted, Duration::from_secs(5)).await,
        "a.bin.enc should appear"
    );

    // The output is a valid container that decrypts to the original.
    let restored = out.path().join("a.bin.restored");
    FileProcessor::new(Arc::new(NullSink))
        .decrypt_file(&encrypted, &restored, &KEY)
        .expect("watcher output decrypts");
    assert_eq!(std::fs::read(&restored).unwrap(), payload);

    // A successful CREATE event reaches the channel. The event is queued
    // just after the output file appears, so give the dispatcher a beat.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut saw_success = false;
    while let Ok(event) = events.try_recv() {
        if event.success && event.path.ends_with("a.bin") {
            saw_success = true;
        }
    }
    assert!(saw_success, "expected a successful file event for a.bin");

    watcher.stop().await;
}

#[tokio::test]
async fn duplicate_create_is_suppressed() {
    let watch = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let (watcher, mut events) = DirWatcher::new(
        &test_config(watch.path(), out.path()),
        Algorithm::LeaPcbc,
        KEY.to_vec(),
        Arc::new(NullSink),
    )
    .unwrap();
    watcher.start().unwrap();

    let target = watch.path().join("a.bin");
    std::fs::write(&target, b"first write").unwrap();

    let encrypted = out.path().join("a.bin.enc");
    assert!(wait_for(&encrypted, Duration::from_secs(5)).await);
    let first_bytes = std::fs::read(&encrypted).unwrap();

    // Recreate the same file; the existing output must suppress re-encryption.
    std::fs::remove_file(&target).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(&target, b"first write").unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;

    assert_eq!(
        std::fs::read(&encrypted).unwrap(),
        first_bytes,
        "output must not be rewritten"
    );

    let mut saw_duplicate = false;
    while let Ok(event) = events.try_recv() {
        if !event.success && event.message.contains("already encrypted") {
            saw_duplicate = true;
        }
    }
    assert!(saw_duplicate, "expected a duplicate observation");

    watcher.stop().await;
}

#[tokio::test]
async fn enc_files_are_ignored() {
    let watch = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let (watcher, _events) = DirWatcher::new(
        &test_config(watch.path(), out.path()),
        Algorithm::LeaPcbc,
        KEY.to_vec(),
        Arc::new(NullSink),
    )
    .unwrap();
    watcher.start().unwrap();

    std::fs::write(watch.path().join("noise.enc"), b"pretend container").unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;

    assert!(
        !out.path().join("noise.enc.enc").exists(),
        "outputs must never be re-encrypted"
    );

    watcher.stop().await;
}

#[tokio::test]
async fn start_is_rejected_while_running_and_stop_is_idempotent() {
    let watch = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let (watcher, _events) = DirWatcher::new(
        &test_config(watch.path(), out.path()),
        Algorithm::LeaPcbc,
        KEY.to_vec(),
        Arc::new(NullSink),
    )
    .unwrap();

    watcher.start().unwrap();
    assert!(watcher.is_running());
    assert!(matches!(watcher.start(), Err(WatchError::AlreadyRunning)));

    watcher.stop().await;
    assert!(!watcher.is_running());
    // Second stop is a no-op.
    watcher.stop().await;

    // The watcher can be restarted after a stop.
    watcher.start().unwrap();
    assert!(watcher.is_running());
    watcher.stop().await;
}

#[tokio::test]
async fn encrypt_existing_scans_three_files() {
    let watch = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    std::fs::write(watch.path().join("a"), b"alpha").unwrap();
    std::fs::write(watch.path().join("b"), b"bravo").unwrap();
    std::fs::write(watch.path().join("c"), b"charlie").unwrap();

    let (watcher, _events) = DirWatcher::new(
        &test_config(watch.path(), out.path()),
        Algorithm::LeaPcbc,
        KEY.to_vec(),
        Arc::new(NullSink),
    )
    .unwrap();

    // Works without start(); the scan is independent of the watch loop.
    let processed = watcher.encrypt_existing().unwrap();
    assert_eq!(processed.len(), 3);

    let processor = FileProcessor::new(Arc::new(NullSink));
    for (name, content) in [("a", b"alpha" as &[u8]), ("b", b"bravo"), ("c", b"charlie")] {
        let encrypted = out.path().join(format!("{name}.enc"));
        assert!(encrypted.exists(), "missing {name}.enc");
        let restored = out.path().join(format!("{name}.restored"));
        processor.decrypt_file(&encrypted, &restored, &KEY).unwrap();
        assert_eq!(std::fs::read(&restored).unwrap(), content);
    }
}
