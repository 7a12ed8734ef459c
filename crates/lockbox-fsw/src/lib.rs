//! lockbox-fsw: watch a directory and encrypt new files exactly once.
//!
//! One dispatcher task blocks on the platform event source (via `notify`)
//! and handles CREATE events inline: settle, duplicate-check, encrypt,
//! emit a [`FileEvent`]. Everything else (writes, renames, removals) is
//! observed and logged only. Existing `.enc` outputs are never re-created,
//! and `.enc` inputs are ignored so watching your own output directory
//! cannot loop.

mod watcher;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use watcher::DirWatcher;

/// What the watcher observed for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Create,
    Write,
    Rename,
    Remove,
    Error,
}

impl FileEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileEventKind::Create => "CREATE",
            FileEventKind::Write => "WRITE",
            FileEventKind::Rename => "RENAME",
            FileEventKind::Remove => "REMOVE",
            FileEventKind::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation on the watcher's output channel.
#[derive(Debug, Clone)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub message: String,
}

impl FileEvent {
    fn now(kind: FileEventKind, path: PathBuf, success: bool, message: impl Into<String>) -> Self {
        FileEvent {
            kind,
            path,
            timestamp: Utc::now(),
            success,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watcher is already running")]
    AlreadyRunning,

    #[error("watch source error: {0}")]
    Notify(#[from] notify::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl WatchError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        WatchError::Io {
            context: context.into(),
            source,
        }
    }
}
