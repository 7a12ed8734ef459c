//! lockbox-net: verified file transfer over a stream socket.
//!
//! The wire unit is a frame:
//! ```text
//! [cmd_len: u16 BE][cmd: ASCII][payload_len: u32 BE][payload ≤ 64 KiB]
//! ```
//! A transfer is `HELLO/READY`, then `FILE_START`, `METADATA`, a run of
//! `FILE_DATA` frames, `FILE_END`, and a terminal `SUCCESS` or `ERROR`.
//! The receiver decrypts, recomputes the plaintext SHA-256, and only keeps
//! the file when it matches the metadata hash. Nothing here authenticates
//! the peer; run it on trusted networks only.

pub mod client;
pub mod protocol;
pub mod server;

mod error;

pub use client::{ProgressFn, TransferClient};
pub use error::NetError;
pub use protocol::{Frame, MAX_PAYLOAD};
pub use server::TransferServer;
