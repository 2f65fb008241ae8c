//! Content fingerprints of serde value objects.
//!
//! The value is streamed as JSON straight into a blake3 hasher, so equal
//! values always produce equal fingerprints across processes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Leading 16 hex digits, for log lines.
    pub fn short(&self) -> String {
        self.0[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    Hash256(*blake3::hash(bytes).as_bytes())
}

pub fn hash_serde<T: Serialize>(value: &T) -> Result<Hash256> {
    let mut hasher = blake3::Hasher::new();
    serde_json::to_writer(&mut hasher, value)?;
    Ok(Hash256(*hasher.finalize().as_bytes()))
}
