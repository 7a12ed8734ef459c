//! The 128-bit block-cipher capability consumed by chaining modes.
//!
//! `Pcbc` depends only on this trait, not on `Lea` directly, so any
//! fixed-size block primitive can be chained.

use crate::CryptoError;

pub trait BlockCipher: Send + Sync {
    /// Block size in bytes.
    fn block_size(&self) -> usize;

    /// Encrypt exactly one block from `src` into `dst`.
    ///
    /// Both slices must be exactly `block_size()` bytes.
    fn encrypt_block(&self, dst: &mut [u8], src: &[u8]) -> Result<(), CryptoError>;

    /// Decrypt exactly one block from `src` into `dst`.
    fn decrypt_block(&self, dst: &mut [u8], src: &[u8]) -> Result<(), CryptoError>;
}
