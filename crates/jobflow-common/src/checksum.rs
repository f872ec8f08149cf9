//! SHA-256 helpers for synthesized identifiers and upload verification

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of a byte slice
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}
