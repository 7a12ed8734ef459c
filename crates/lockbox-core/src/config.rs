//! Toolkit configuration (loaded from lockbox.toml).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LockboxConfig {
    pub logging: LoggingConfig,
    pub crypto: CryptoConfig,
    pub watcher: WatcherConfig,
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Default algorithm name: "LEA" or "LEA-PCBC"
    pub algorithm: String,
    /// Raw key file (16, 24, or 32 bytes)
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Directory observed for new files
    pub watch_dir: PathBuf,
    /// Where `.enc` outputs are written
    pub output_dir: PathBuf,
    /// Delay after CREATE before reading the file, in milliseconds
    pub settle_delay_ms: u64,
    /// Bounded capacity of the file-event channel; events are dropped,
    /// never blocked on, when it is full
    pub event_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Server listen address
    pub listen: String,
    /// Where the server writes verified files
    pub output_dir: PathBuf,
    /// FILE_DATA chunk size in bytes (must stay within the 64 KiB frame cap)
    pub chunk_size: usize,
    /// Client connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Grace period for in-flight connections at shutdown, in milliseconds
    pub shutdown_grace_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            algorithm: "LEA-PCBC".into(),
            key_file: None,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("./watch"),
            output_dir: PathBuf::from("./encrypted"),
            settle_delay_ms: 100,
            event_capacity: 100,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9040".into(),
            output_dir: PathBuf::from("./received"),
            chunk_size: 32 * 1024,
            connect_timeout_secs: 10,
            shutdown_grace_ms: 1000,
        }
    }
}

impl LockboxConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::io(format!("reading config {}", path.display()), e))?;
        toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))
    }
}
