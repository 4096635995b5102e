//! Window token sent in the `Authorization` header
//!
//! The token is the lowercase hex SHA-256 of the decimal ten-second window
//! index followed by the shared server key. It stays stable for ten seconds
//! and then rotates. This is a shared-secret scheme, not an HMAC.

use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Width of one token window in seconds
pub const TOKEN_WINDOW_SECS: u64 = 10;

/// Token for the current window
pub fn generate_hash(server_key: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    generate_hash_at(now, server_key)
}

/// Token for the window containing `unix_seconds`
pub fn generate_hash_at(unix_seconds: u64, server_key: &str) -> String {
    let window = unix_seconds / TOKEN_WINDOW_SECS;
    let mut hasher = Sha256::new();
    hasher.update(format!("{}{}", window, server_key).as_bytes());
    hex::encode(hasher.finalize())
}
