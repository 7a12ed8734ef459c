//! lockbox-crypto: cipher primitives for the Lockbox file-protection toolkit
//!
//! Building blocks, bottom to top:
//!
//! ```text
//! Lea (128-bit block, 128/192/256-bit key)
//!   └── BlockCipher trait ── Pcbc (plaintext+ciphertext feedback chaining)
//!                              └── LeaPcbc (whole message, output = IV ‖ C)
//! Sha256 (incremental, FIPS 180-4)
//! ```
//!
//! The LEA key schedule implemented here is the one the on-disk format was
//! built with, frozen by golden vectors in the `lea` tests. It is not the
//! KS-X-3246 standard schedule; containers produced by this crate are only
//! interoperable with peers using the same schedule.

pub mod block;
pub mod lea;
pub mod padding;
pub mod pcbc;
pub mod random;
pub mod sha256;

mod error;

pub use block::BlockCipher;
pub use error::CryptoError;
pub use lea::Lea;
pub use padding::Recovered;
pub use pcbc::{LeaPcbc, Pcbc};
pub use random::{generate_key, OsRandom, RandomSource};
pub use sha256::Sha256;

/// LEA block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// IV size in bytes (one block).
pub const IV_SIZE: usize = 16;
