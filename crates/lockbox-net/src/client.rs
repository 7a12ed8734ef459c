//! Sending side of the transfer protocol.
//!
//! The file is encrypted into a temporary container first, then the
//! container's metadata header and ciphertext are streamed as separate
//! frames so the receiver can rebuild the container (or decrypt directly)
//! without re-parsing the byte stream.

use std::path::Path;
use std::time::Duration;

use serde_json::json;
use tokio::net::TcpStream;
use tracing::{debug, info};

use lockbox_core::{activity, container, Algorithm, FileProcessor, SharedSink};

use crate::protocol::{cmd, read_frame, write_frame};
use crate::NetError;

/// Progress callback: (bytes_sent, bytes_total, message).
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

pub struct TransferClient {
    address: String,
    connect_timeout: Duration,
    chunk_size: usize,
    processor: FileProcessor,
    sink: SharedSink,
}

impl TransferClient {
    pub fn new(
        address: impl Into<String>,
        connect_timeout: Duration,
        chunk_size: usize,
        sink: SharedSink,
    ) -> Self {
        TransferClient {
            address: address.into(),
            connect_timeout,
            // A frame holds at most 64 KiB; clamp rather than fail later.
            chunk_size: chunk_size.clamp(1, crate::MAX_PAYLOAD),
            processor: FileProcessor::new(sink.clone()),
            sink,
        }
    }

    /// Encrypt `path` and send it, waiting for the server's verdict.
    pub async fn send_file(
        &self,
        path: &Path,
        algorithm: Algorithm,
        key: &[u8],
        progress: Option<&ProgressFn>,
    ) -> Result<(), NetError> {
        let mut stream = self.connect().await?;

        self.handshake(&mut stream, algorithm).await?;

        // Spool the container to a temp file; it is deleted on drop even
        // when the transfer fails mid-way.
        let spool = tempfile::NamedTempFile::new()?;
        self.processor
            .encrypt_file(path, spool.path(), algorithm, key)?;
        let bytes = tokio::fs::read(spool.path()).await?;
        let (metadata_json, ciphertext) = container::split(&bytes)?;

        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let start = format!("{basename}|{}|{}", ciphertext.len(), metadata_json.len());

        self.sink.info(
            activity::SEND_FILE,
            "starting file transfer",
            json!({
                "address": self.address,
                "file": path.display().to_string(),
                "algorithm": algorithm.as_str(),
                "ciphertext_size": ciphertext.len(),
                "metadata_size": metadata_json.len(),
            }),
        );

        write_frame(&mut stream, cmd::FILE_START, start.as_bytes()).await?;
        write_frame(&mut stream, cmd::METADATA, metadata_json).await?;

        let total = ciphertext.len() as u64;
        let mut sent = 0u64;
        let mut chunks = 0usize;
        for chunk in ciphertext.chunks(self.chunk_size) {
            write_frame(&mut stream, cmd::FILE_DATA, chunk).await?;
            sent += chunk.len() as u64;
            chunks += 1;
            if let Some(callback) = progress {
                callback(sent, total, &format!("chunk {chunks}"));
            }
        }
        write_frame(&mut stream, cmd::FILE_END, b"").await?;
        debug!(bytes = sent, chunks, "file data sent, awaiting verdict");

        self.await_verdict(&mut stream).await
    }

    async fn connect(&self) -> Result<TcpStream, NetError> {
        self.sink.info(
            activity::CLIENT_CONNECT,
            "connecting to server",
            json!({ "address": self.address }),
        );
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| NetError::ConnectTimeout(self.address.clone()))??;
        Ok(stream)
    }

    async fn handshake(&self, stream: &mut TcpStream, algorithm: Algorithm) -> Result<(), NetError> {
        let hello = format!("{},SHA256", algorithm.as_str());
        write_frame(stream, cmd::HELLO, hello.as_bytes()).await?;

        let ready = read_frame(stream).await?;
        if ready.command != cmd::READY {
            return Err(NetError::unexpected_command(cmd::READY, &ready.command));
        }
        debug!(
            server_algorithms = %String::from_utf8_lossy(&ready.payload),
            "server ready"
        );
        Ok(())
    }

    async fn await_verdict(&self, stream: &mut TcpStream) -> Result<(), NetError> {
        let verdict = read_frame(stream).await?;
        match verdict.command.as_str() {
            cmd::SUCCESS => {
                info!(address = %self.address, "file received and verified by server");
                self.sink.info(
                    activity::SEND_FILE,
                    "file received and verified by server",
                    json!({
                        "address": self.address,
                        "server_response": String::from_utf8_lossy(&verdict.payload),
                    }),
                );
                Ok(())
            }
            cmd::ERROR => {
                let reason = String::from_utf8_lossy(&verdict.payload).into_owned();
                self.sink.error(
                    activity::SEND_FILE,
                    "server rejected the transfer",
                    json!({ "address": self.address, "server_error": reason }),
                );
                Err(NetError::Remote(reason))
            }
            other => Err(NetError::unexpected_command("SUCCESS or ERROR", other)),
        }
    }
}
