//! lockbox-core: the self-describing encrypted container and the file
//! operations built on it.
//!
//! Container layout (bit-exact):
//! ```text
//! [metadata_len: u32 LE][metadata JSON: metadata_len bytes][ciphertext]
//! ```
//! For `LEA` the ciphertext is a multiple of 16 bytes; for `LEA-PCBC` it is
//! a 16-byte IV followed by a multiple of 16 bytes.
//!
//! `FileProcessor` orchestrates encrypt/decrypt-with-metadata and directory
//! scans; structured activity events flow through an injected [`EventSink`].

pub mod config;
pub mod container;
pub mod metadata;
pub mod processor;
pub mod sink;

mod error;

pub use config::LockboxConfig;
pub use error::{CoreError, DirectoryError};
pub use metadata::{Algorithm, Metadata};
pub use processor::{DirAction, FileProcessor};
pub use sink::{activity, EventSink, Level, NullSink, SharedSink, TracingSink};
