//! Content hashing and timestamps for indexed files
//!
//! Hashes let callers detect unchanged content before re-adding a file to
//! the index.

use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// SHA-256 digest of `bytes` as 64 lowercase hex characters
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Current UTC timestamp in milliseconds since UNIX_EPOCH
pub fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System time before UNIX_EPOCH")
        .as_millis() as u64
}
