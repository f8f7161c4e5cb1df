//! Content fingerprints for idempotent imports

use sha2::{Digest, Sha256};

/// Length in characters of every fingerprint
pub const FINGERPRINT_LEN: usize = 64;

/// Compute the fingerprint of a statement file.
///
/// Lowercase hex SHA-256 over the full byte stream. Identical bytes always
/// produce the same value.
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
