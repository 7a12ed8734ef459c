//! The directory watcher: platform events in, encrypted files and
//! [`FileEvent`]s out.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lockbox_core::config::WatcherConfig;
use lockbox_core::{activity, Algorithm, DirectoryError, FileProcessor, SharedSink};

use crate::{FileEvent, FileEventKind, WatchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Watches one directory and encrypts each new file exactly once.
///
/// `start` is rejected while running; `stop` is idempotent. The watcher
/// can be restarted after a stop.
pub struct DirWatcher {
    inner: Arc<Inner>,
}

struct Inner {
    watch_dir: PathBuf,
    output_dir: PathBuf,
    algorithm: Algorithm,
    key: Vec<u8>,
    settle_delay: Duration,
    processor: FileProcessor,
    sink: SharedSink,
    events_tx: mpsc::Sender<FileEvent>,
    state: Mutex<WatchState>,
    cancel: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DirWatcher {
    /// Build a watcher and its event channel. Creates the watch and output
    /// directories if needed; does not start watching yet.
    pub fn new(
        config: &WatcherConfig,
        algorithm: Algorithm,
        key: Vec<u8>,
        sink: SharedSink,
    ) -> Result<(Self, mpsc::Receiver<FileEvent>), WatchError> {
        for dir in [&config.watch_dir, &config.output_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| WatchError::io(format!("creating directory {}", dir.display()), e))?;
        }

        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let processor = FileProcessor::new(sink.clone());

        let watcher = DirWatcher {
            inner: Arc::new(Inner {
                watch_dir: config.watch_dir.clone(),
                output_dir: config.output_dir.clone(),
                algorithm,
                key,
                settle_delay: Duration::from_millis(config.settle_delay_ms),
                processor,
                sink,
                events_tx,
                state: Mutex::new(WatchState::Stopped),
                cancel: Mutex::new(None),
                task: Mutex::new(None),
            }),
        };
        Ok((watcher, events_rx))
    }

    pub fn watch_dir(&self) -> &Path {
        &self.inner.watch_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.inner.output_dir
    }

    pub fn is_running(&self) -> bool {
        *self.inner.state.lock().expect("state lock poisoned") == WatchState::Running
    }

    /// Subscribe to the platform source and spawn the dispatch task.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), WatchError> {
        {
            let mut state = self.inner.state.lock().expect("state lock poisoned");
            if *state != WatchState::Stopped {
                return Err(WatchError::AlreadyRunning);
            }
            *state = WatchState::Starting;
        }

        let result = self.subscribe();
        if result.is_err() {
            *self.inner.state.lock().expect("state lock poisoned") = WatchState::Stopped;
        }
        result
    }

    fn subscribe(&self) -> Result<(), WatchError> {
        let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>(64);
        let mut source = RecommendedWatcher::new(
            move |res| {
                let _ = tx.blocking_send(res);
            },
            notify::Config::default(),
        )?;
        source.watch(&self.inner.watch_dir, RecursiveMode::NonRecursive)?;

        let cancel = CancellationToken::new();
        *self.inner.cancel.lock().expect("cancel lock poisoned") = Some(cancel.clone());

        let inner = self.inner.clone();
        let task = tokio::spawn(dispatch(inner, source, rx, cancel));
        *self.inner.task.lock().expect("task lock poisoned") = Some(task);

        *self.inner.state.lock().expect("state lock poisoned") = WatchState::Running;

        self.inner.sink.info(
            activity::FSW_START,
            "file system watcher started",
            json!({
                "watch_dir": self.inner.watch_dir.display().to_string(),
                "output_dir": self.inner.output_dir.display().to_string(),
                "algorithm": self.inner.algorithm.as_str(),
            }),
        );
        Ok(())
    }

    /// Cancel the dispatch task and wait for it to drain. A no-op when the
    /// watcher is not running.
    pub async fn stop(&self) {
        {
            let mut state = self.inner.state.lock().expect("state lock poisoned");
            match *state {
                WatchState::Running | WatchState::Starting => *state = WatchState::Stopping,
                _ => return,
            }
        }

        if let Some(cancel) = self.inner.cancel.lock().expect("cancel lock poisoned").take() {
            cancel.cancel();
        }
        let task = self.inner.task.lock().expect("task lock poisoned").take();
        if let Some(task) = task {
            let _ = task.await;
        }

        self.inner.sink.info(
            activity::FSW_STOP,
            "file system watcher stopped",
            json!({ "watch_dir": self.inner.watch_dir.display().to_string() }),
        );
    }

    /// One-shot scan of the watch directory: encrypt every regular file at
    /// the top level. Independent of the running state.
    pub fn encrypt_existing(&self) -> Result<Vec<PathBuf>, DirectoryError> {
        let inner = &self.inner;
        inner.sink.info(
            activity::ENCRYPT,
            "encrypting existing files",
            json!({
                "directory": inner.watch_dir.display().to_string(),
                "algorithm": inner.algorithm.as_str(),
            }),
        );
        inner.processor.process_directory(
            &inner.watch_dir,
            &inner.output_dir,
            inner.algorithm,
            &inner.key,
            lockbox_core::DirAction::Encrypt,
        )
    }
}

async fn dispatch(
    inner: Arc<Inner>,
    source: RecommendedWatcher,
    mut rx: mpsc::Receiver<notify::Result<notify::Event>>,
    cancel: CancellationToken,
) {
    // Owning the platform watcher here ties its lifetime to the loop;
    // dropping it on exit closes the watch.
    let _source = source;

    debug!(dir = %inner.watch_dir.display(), "watch dispatch loop started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("watch dispatch loop cancelled");
                break;
            }
            event = rx.recv() => match event {
                Some(Ok(event)) => inner.handle_event(event).await,
                Some(Err(e)) => {
                    // Source errors are observable but never fatal.
                    warn!(dir = %inner.watch_dir.display(), "watch source error: {e}");
                    inner.emit(FileEvent::now(
                        FileEventKind::Error,
                        inner.watch_dir.clone(),
                        false,
                        format!("watch source error: {e}"),
                    ));
                }
                None => {
                    warn!(dir = %inner.watch_dir.display(), "watch source closed");
                    break;
                }
            }
        }
    }

    *inner.state.lock().expect("state lock poisoned") = WatchState::Stopped;
}

impl Inner {
    async fn handle_event(&self, event: notify::Event) {
        let kind = match event.kind {
            EventKind::Create(_) => FileEventKind::Create,
            EventKind::Modify(ModifyKind::Name(_)) => FileEventKind::Rename,
            EventKind::Modify(_) => FileEventKind::Write,
            EventKind::Remove(_) => FileEventKind::Remove,
            _ => return,
        };

        for path in event.paths {
            // Our own outputs; touching them would loop.
            if path.extension().and_then(|e| e.to_str()) == Some("enc") {
                continue;
            }
            match kind {
                FileEventKind::Create => self.handle_create(path).await,
                observed => {
                    debug!(kind = %observed, path = %path.display(), "file event observed");
                    self.emit(FileEvent::now(
                        observed,
                        path,
                        true,
                        format!("{} observed", observed.as_str().to_ascii_lowercase()),
                    ));
                }
            }
        }
    }

    async fn handle_create(&self, path: PathBuf) {
        // The file may already be gone (create-then-delete race), and
        // directories are not encrypted.
        let stat = match tokio::fs::metadata(&path).await {
            Ok(stat) => stat,
            Err(_) => return,
        };
        if stat.is_dir() {
            return;
        }

        self.sink.info(
            activity::FSW_NEW_FILE,
            "new file detected",
            json!({
                "path": path.display().to_string(),
                "size": stat.len(),
            }),
        );

        // Give the producer a moment to finish writing. Best effort only;
        // a slow writer can still race us.
        tokio::time::sleep(self.settle_delay).await;

        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return,
        };
        let output = self.output_dir.join(format!("{name}.enc"));

        if output.exists() {
            self.sink.warning(
                activity::FSW_NEW_FILE,
                "file already encrypted",
                false,
                json!({
                    "path": path.display().to_string(),
                    "output_path": output.display().to_string(),
                }),
            );
            self.emit(FileEvent::now(
                FileEventKind::Create,
                path,
                false,
                "file already encrypted",
            ));
            return;
        }

        match self
            .processor
            .encrypt_file(&path, &output, self.algorithm, &self.key)
        {
            Ok(_) => {
                info!(path = %path.display(), output = %output.display(), "auto-encrypted");
                self.emit(FileEvent::now(
                    FileEventKind::Create,
                    path,
                    true,
                    format!("file encrypted: {}", output.display()),
                ));
            }
            Err(e) => {
                self.sink.error(
                    activity::ENCRYPT,
                    "auto-encryption failed",
                    json!({
                        "path": path.display().to_string(),
                        "output_path": output.display().to_string(),
                        "error": e.to_string(),
                    }),
                );
                self.emit(FileEvent::now(
                    FileEventKind::Create,
                    path,
                    false,
                    format!("encryption failed: {e}"),
                ));
            }
        }
    }

    /// Non-blocking send; when the channel is full the event is dropped.
    fn emit(&self, event: FileEvent) {
        if self.events_tx.try_send(event).is_err() {
            debug!("file event channel full, dropping event");
        }
    }
}
