use std::path::PathBuf;

use thiserror::Error;

use lockbox_crypto::CryptoError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("container truncated: {0} bytes is too short for the metadata header")]
    ShortHeader(usize),

    #[error("metadata length {len} is invalid for a container with {available} payload bytes")]
    HeaderLengthInvalid { len: u32, available: usize },

    #[error("metadata is not valid JSON: {0}")]
    MetadataMalformed(#[from] serde_json::Error),

    #[error("hash verification failed for {filename}: expected {expected}, got {actual}")]
    HashMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("config error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    /// Wrap an I/O error with the operation and path it came from.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CoreError::Io {
            context: context.into(),
            source,
        }
    }
}

/// A directory scan that stopped on its first failure. Carries the files
/// that were processed successfully before the error.
#[derive(Debug, Error)]
#[error("failed to process {}: {source}", .path.display())]
pub struct DirectoryError {
    pub path: PathBuf,
    pub processed: Vec<PathBuf>,
    #[source]
    pub source: Box<CoreError>,
}
