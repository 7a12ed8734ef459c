//! Frame codec for the transfer protocol.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::NetError;

/// Hard cap on a single frame's payload.
pub const MAX_PAYLOAD: usize = 64 * 1024;

/// Commands never get anywhere near this; anything longer is garbage or an
/// attack, not a frame.
const MAX_COMMAND_LEN: usize = 64;

pub mod cmd {
    pub const HELLO: &str = "HELLO";
    pub const READY: &str = "READY";
    pub const FILE_START: &str = "FILE_START";
    pub const METADATA: &str = "METADATA";
    pub const FILE_DATA: &str = "FILE_DATA";
    pub const FILE_END: &str = "FILE_END";
    pub const SUCCESS: &str = "SUCCESS";
    pub const ERROR: &str = "ERROR";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub payload: Vec<u8>,
}

/// Encode one frame to bytes. Callers are expected to have checked the
/// payload cap; this is the raw layout only.
pub fn encode(command: &str, payload: &[u8]) -> Vec<u8> {
    let cmd = command.as_bytes();
    let mut out = Vec::with_capacity(2 + cmd.len() + 4 + payload.len());
    out.extend_from_slice(&(cmd.len() as u16).to_be_bytes());
    out.extend_from_slice(cmd);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    command: &str,
    payload: &[u8],
) -> Result<(), NetError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(NetError::PayloadTooLarge(payload.len()));
    }
    writer.write_all(&encode(command, payload)).await?;
    Ok(())
}

pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, NetError> {
    let mut len2 = [0u8; 2];
    reader.read_exact(&mut len2).await?;
    let cmd_len = u16::from_be_bytes(len2) as usize;
    if cmd_len == 0 || cmd_len > MAX_COMMAND_LEN {
        return Err(NetError::Protocol(format!(
            "implausible command length {cmd_len}"
        )));
    }

    let mut cmd = vec![0u8; cmd_len];
    reader.read_exact(&mut cmd).await?;
    let command = String::from_utf8(cmd)
        .map_err(|_| NetError::Protocol("command is not ASCII".into()))?;
    if !command.is_ascii() {
        return Err(NetError::Protocol("command is not ASCII".into()));
    }

    let mut len4 = [0u8; 4];
    reader.read_exact(&mut len4).await?;
    let payload_len = u32::from_be_bytes(len4) as usize;
    if payload_len > MAX_PAYLOAD {
        return Err(NetError::PayloadTooLarge(payload_len));
    }

    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        reader.read_exact(&mut payload).await?;
    }

    Ok(Frame { command, payload })
}
