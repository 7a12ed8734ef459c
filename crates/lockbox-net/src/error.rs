use thiserror::Error;

use lockbox_core::CoreError;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("frame payload of {0} bytes exceeds the 64 KiB limit")]
    PayloadTooLarge(usize),

    #[error("connection to {0} timed out")]
    ConnectTimeout(String),

    #[error("server is already running")]
    AlreadyRunning,

    #[error("server error: {0}")]
    Remote(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetError {
    pub fn unexpected_command(expected: &str, got: &str) -> Self {
        NetError::Protocol(format!("expected {expected}, got {got}"))
    }
}
