//! Receiving side of the transfer protocol.
//!
//! One task accepts; each connection gets its own task. The accept loop
//! only ever exits on an explicit stop — a failed `accept` is logged and
//! the loop keeps serving, so one bad client cannot take the server down.
//! Received files are written under the output directory using the
//! *basename* of the announced filename; path separators in metadata are
//! never honored.

use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lockbox_core::{activity, CoreError, FileProcessor, Metadata, SharedSink};

use crate::protocol::{cmd, read_frame, write_frame};
use crate::NetError;

/// A server is one-shot: `start` once, `stop` once. The cancellation
/// tokens are spent at stop, so a new listener means a new server value.
pub struct TransferServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    output_dir: PathBuf,
    key: Vec<u8>,
    processor: FileProcessor,
    sink: SharedSink,
    shutdown_grace: Duration,
    running: AtomicBool,
    stopped: AtomicBool,
    /// Stops the accept loop.
    accept_cancel: CancellationToken,
    /// Closes in-flight connections once the grace period is over.
    conn_cancel: CancellationToken,
    connections: RwLock<HashMap<u64, SocketAddr>>,
    next_conn_id: AtomicU64,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl TransferServer {
    pub fn new(
        output_dir: PathBuf,
        key: Vec<u8>,
        shutdown_grace: Duration,
        sink: SharedSink,
    ) -> Self {
        TransferServer {
            inner: Arc::new(ServerInner {
                output_dir,
                key,
                processor: FileProcessor::new(sink.clone()),
                sink,
                shutdown_grace,
                running: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                accept_cancel: CancellationToken::new(),
                conn_cancel: CancellationToken::new(),
                connections: RwLock::new(HashMap::new()),
                next_conn_id: AtomicU64::new(1),
                accept_task: Mutex::new(None),
            }),
        }
    }

    /// Bind and start accepting. Returns the bound address, so `:0`
    /// listeners report their ephemeral port.
    pub async fn start(&self, address: &str) -> Result<SocketAddr, NetError> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(NetError::Protocol("server already stopped".into()));
        }
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(NetError::AlreadyRunning);
        }

        std::fs::create_dir_all(&self.inner.output_dir).map_err(|e| {
            self.inner.running.store(false, Ordering::SeqCst);
            CoreError::io(
                format!("creating output directory {}", self.inner.output_dir.display()),
                e,
            )
        })?;

        let listener = match TcpListener::bind(address).await {
            Ok(listener) => listener,
            Err(e) => {
                self.inner.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        let local_addr = listener.local_addr()?;

        self.inner.sink.info(
            activity::SERVER_START,
            "transfer server started",
            json!({
                "address": local_addr.to_string(),
                "output_dir": self.inner.output_dir.display().to_string(),
            }),
        );
        info!(address = %local_addr, "transfer server listening");

        let inner = self.inner.clone();
        let task = tokio::spawn(accept_loop(inner, listener));
        *self.inner.accept_task.lock().expect("accept task lock poisoned") = Some(task);

        Ok(local_addr)
    }

    /// Stop accepting, give in-flight connections a grace period, then
    /// close them. Idempotent.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.stopped.store(true, Ordering::SeqCst);

        self.inner.accept_cancel.cancel();
        let task = self.inner.accept_task.lock().expect("accept task lock poisoned").take();
        if let Some(task) = task {
            let _ = task.await;
        }

        let deadline = tokio::time::Instant::now() + self.inner.shutdown_grace;
        while tokio::time::Instant::now() < deadline {
            if self.inner.connections.read().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let leftover = self.inner.connections.read().await.len();
        if leftover > 0 {
            warn!(connections = leftover, "closing connections still in flight");
        }
        self.inner.conn_cancel.cancel();

        self.inner.sink.info(
            activity::SERVER_STOP,
            "transfer server stopped",
            json!({ "connections_closed": leftover }),
        );
    }

    /// Number of connections currently being served.
    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}

async fn accept_loop(inner: Arc<ServerInner>, listener: TcpListener) {
    loop {
        tokio::select! {
            _ = inner.accept_cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let id = inner.next_conn_id.fetch_add(1, Ordering::Relaxed);
                    inner.connections.write().await.insert(id, peer);
                    let inner = Arc::clone(&inner);
                    tokio::spawn(async move {
                        serve_connection(&inner, stream, peer).await;
                        inner.connections.write().await.remove(&id);
                    });
                }
                Err(e) => {
                    // Transient failure; the loop must keep serving.
                    warn!("accept error: {e}");
                    continue;
                }
            }
        }
    }
    debug!("accept loop exited");
}

async fn serve_connection(inner: &ServerInner, mut stream: TcpStream, peer: SocketAddr) {
    inner.sink.info(
        activity::CLIENT_CONNECT,
        "client connected",
        json!({ "remote_addr": peer.to_string() }),
    );

    let outcome = tokio::select! {
        _ = inner.conn_cancel.cancelled() => {
            debug!(%peer, "connection closed at shutdown");
            return;
        }
        outcome = handle_transfer(inner, &mut stream, peer) => outcome,
    };

    if let Err(e) = outcome {
        warn!(%peer, "transfer failed: {e}");
        let reason = terminal_reason(&e);
        let _ = write_frame(&mut stream, cmd::ERROR, reason.as_bytes()).await;
        inner.sink.error(
            activity::RECEIVE_FILE,
            "transfer failed",
            json!({ "remote_addr": peer.to_string(), "error": e.to_string() }),
        );
    }

    debug!(%peer, "client disconnected");
}

/// The short human string sent in the terminal ERROR frame.
fn terminal_reason(error: &NetError) -> String {
    match error {
        NetError::Core(CoreError::HashMismatch { .. }) => "hash verification failed".to_string(),
        other => other.to_string(),
    }
}

async fn handle_transfer(
    inner: &ServerInner,
    stream: &mut TcpStream,
    peer: SocketAddr,
) -> Result<(), NetError> {
    handshake(stream).await?;

    let (metadata, ciphertext) = receive_file(inner, stream, peer).await?;

    // Only the basename of the announced filename is honored; a peer
    // sending "../../etc/passwd" writes to "<out>/passwd".
    let safe_name = sanitize_filename(&metadata.filename);
    let output = inner.output_dir.join(&safe_name);

    inner
        .processor
        .decrypt_payload(&metadata, &ciphertext, &output, &inner.key)?;

    inner.sink.info(
        activity::RECEIVE_FILE,
        "file received and verified",
        json!({
            "remote_addr": peer.to_string(),
            "original_file": metadata.filename,
            "output_file": output.display().to_string(),
            "algorithm": metadata.encryption_algorithm.as_str(),
            "hash_verified": metadata.hash.is_some(),
        }),
    );
    info!(%peer, file = %safe_name, "file received and verified");

    write_frame(stream, cmd::SUCCESS, b"file received and verified").await?;
    Ok(())
}

async fn handshake(stream: &mut TcpStream) -> Result<(), NetError> {
    let hello = read_frame(stream).await?;
    if hello.command != cmd::HELLO {
        return Err(NetError::unexpected_command(cmd::HELLO, &hello.command));
    }
    debug!(
        client_algorithms = %String::from_utf8_lossy(&hello.payload),
        "client hello"
    );
    write_frame(stream, cmd::READY, b"LEA,PCBC,SHA256").await?;
    Ok(())
}

async fn receive_file(
    inner: &ServerInner,
    stream: &mut TcpStream,
    peer: SocketAddr,
) -> Result<(Metadata, Vec<u8>), NetError> {
    let start = read_frame(stream).await?;
    if start.command != cmd::FILE_START {
        return Err(NetError::unexpected_command(cmd::FILE_START, &start.command));
    }
    let announced = parse_file_start(&start.payload)?;
    debug!(
        %peer,
        file = %announced.basename,
        ciphertext_size = announced.ciphertext_size,
        "file transfer started"
    );

    let metadata_frame = read_frame(stream).await?;
    if metadata_frame.command != cmd::METADATA {
        return Err(NetError::unexpected_command(cmd::METADATA, &metadata_frame.command));
    }
    let metadata = Metadata::from_json(&metadata_frame.payload)?;

    // Spool the ciphertext to a temp file next to the output; it is
    // removed on drop whether or not verification succeeds.
    let mut spool = tempfile::NamedTempFile::new_in(&inner.output_dir)
        .map_err(|e| CoreError::io("creating receive spool", e))?;

    let mut received = 0u64;
    loop {
        let frame = read_frame(stream).await?;
        match frame.command.as_str() {
            cmd::FILE_DATA => {
                spool
                    .write_all(&frame.payload)
                    .map_err(|e| CoreError::io("writing receive spool", e))?;
                received += frame.payload.len() as u64;
            }
            cmd::FILE_END => break,
            other => {
                return Err(NetError::unexpected_command("FILE_DATA or FILE_END", other));
            }
        }
    }

    if received != announced.ciphertext_size {
        warn!(
            %peer,
            announced = announced.ciphertext_size,
            received,
            "ciphertext size differs from FILE_START announcement"
        );
    }

    let ciphertext = std::fs::read(spool.path())
        .map_err(|e| CoreError::io("reading receive spool", e))?;
    Ok((metadata, ciphertext))
}

struct FileStart {
    basename: String,
    ciphertext_size: u64,
}

fn parse_file_start(payload: &[u8]) -> Result<FileStart, NetError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| NetError::Protocol("FILE_START is not UTF-8".into()))?;
    let mut parts = text.split('|');
    let basename = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| NetError::Protocol("FILE_START missing filename".into()))?;
    let ciphertext_size = parts
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| NetError::Protocol("FILE_START missing ciphertext size".into()))?;
    // The metadata size field is advisory; tolerate its absence.
    Ok(FileStart {
        basename: basename.to_string(),
        ciphertext_size,
    })
}

/// Strip any directory components, whichever separator the peer used.
fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "unnamed".to_string()
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_unix_and_windows_paths() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("/etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\..\\windows\\system32\\cfg"), "cfg");
        assert_eq!(sanitize_filename("a/b\\c/d.txt"), "d.txt");
        assert_eq!(sanitize_filename(""), "unnamed");
        assert_eq!(sanitize_filename("../.."), "unnamed");
    }

    #[test]
    fn file_start_parses_and_rejects() {
        let parsed = parse_file_start(b"data.bin|1024|222").unwrap();
        assert_eq!(parsed.basename, "data.bin");
        assert_eq!(parsed.ciphertext_size, 1024);

        assert!(parse_file_start(b"").is_err());
        assert!(parse_file_start(b"name-only").is_err());
        assert!(parse_file_start(b"name|not-a-number|3").is_err());
    }
}
