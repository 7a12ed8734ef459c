//! Emit and parse the on-disk container: a little-endian u32 length, the
//! metadata JSON, then the raw ciphertext.

use crate::{CoreError, Metadata};

/// Shortest legal metadata JSON is the empty object `{}`.
const MIN_METADATA_LEN: usize = 2;

/// Serialize `metadata` and prepend it, length-prefixed, to `ciphertext`.
pub fn emit(metadata: &Metadata, ciphertext: &[u8]) -> Result<Vec<u8>, CoreError> {
    let json = metadata.to_json()?;
    let mut out = Vec::with_capacity(4 + json.len() + ciphertext.len());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(ciphertext);
    Ok(out)
}

/// Split a container into its raw metadata JSON bytes and ciphertext,
/// without parsing the JSON. The transfer path uses this to forward the
/// header bytes verbatim.
pub fn split(data: &[u8]) -> Result<(&[u8], &[u8]), CoreError> {
    if data.len() < 4 {
        return Err(CoreError::ShortHeader(data.len()));
    }
    let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let available = data.len() - 4;
    if (len as usize) < MIN_METADATA_LEN || len as usize > available {
        return Err(CoreError::HeaderLengthInvalid { len, available });
    }
    let body = &data[4..];
    Ok(body.split_at(len as usize))
}

/// Parse a container into its metadata and ciphertext.
pub fn parse(data: &[u8]) -> Result<(Metadata, &[u8]), CoreError> {
    let (json, ciphertext) = split(data)?;
    Ok((Metadata::from_json(json)?, ciphertext))
}
