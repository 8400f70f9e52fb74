//! Hashing System - SHA-256 content addressing
//!
//! Cache identities are derived from file content, never from file paths.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::PatchError;

/// Length of the short hash used in stage tags
pub const SHORT_HASH_LEN: usize = 8;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Stream a file through SHA-256
pub fn sha256_file(path: &Path) -> Result<String, PatchError> {
    let file = File::open(path).map_err(|e| PatchError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).map_err(|e| PatchError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// First eight hex characters of the file's content hash
pub fn short_file_hash(path: &Path) -> Result<String, PatchError> {
    let mut full = sha256_file(path)?;
    full.truncate(SHORT_HASH_LEN);
    Ok(full)
}

// We need hex encoding
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
