use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("LEA key must be 128, 192, or 256 bits, got {0}")]
    BadKeySize(usize),

    #[error("block must be {expected} bytes, got {got}")]
    BlockSizeMismatch { expected: usize, got: usize },

    #[error("input length {0} is not a multiple of the block size")]
    NotBlockAligned(usize),

    #[error("IV must be {expected} bytes, got {got}")]
    BadIvLength { expected: usize, got: usize },

    #[error("ciphertext shorter than the {0}-byte IV")]
    CiphertextTooShort(usize),

    #[error("random source failed: {0}")]
    Random(String),
}
