//! The metadata record embedded in every container.
//!
//! Field names are canonical — they are the JSON keys on disk and on the
//! wire. Optional fields are omitted entirely when absent so old parsers
//! keep working.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Supported encryption algorithms, by their on-disk names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// Block-by-block LEA with PKCS#7 padding, no chaining.
    #[serde(rename = "LEA")]
    Lea,
    /// LEA chained with PCBC; ciphertext carries a 16-byte IV prefix.
    #[serde(rename = "LEA-PCBC")]
    LeaPcbc,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Lea => "LEA",
            Algorithm::LeaPcbc => "LEA-PCBC",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LEA" => Ok(Algorithm::Lea),
            "LEA-PCBC" | "PCBC" => Ok(Algorithm::LeaPcbc),
            other => Err(CoreError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Source path as observed at encryption time.
    pub filename: String,
    /// Plaintext size in bytes.
    pub size: u64,
    /// Moment of encryption (UTC, RFC 3339 in JSON).
    pub timestamp: DateTime<Utc>,
    pub encryption_algorithm: Algorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<String>,
    /// Lowercase hex SHA-256 of the plaintext.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Lowercase hex IV. Informational: decryption reads the IV embedded in
    /// the ciphertext, never this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_info: Option<String>,
}

impl Metadata {
    /// Assemble metadata for a fresh encryption, stamped with the current
    /// UTC time.
    pub fn new(
        filename: impl Into<String>,
        size: u64,
        algorithm: Algorithm,
        hash: Option<String>,
        iv: Option<&[u8]>,
    ) -> Self {
        let hash_algorithm = hash.as_ref().map(|_| "SHA-256".to_string());
        Metadata {
            filename: filename.into(),
            size,
            timestamp: Utc::now(),
            encryption_algorithm: algorithm,
            hash_algorithm,
            hash,
            iv: iv.map(hex::encode),
            key_info: None,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self, CoreError> {
        Ok(serde_json::from_slice(data)?)
    }
}
