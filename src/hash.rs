//! SHA-256 hashing of raw float payloads and hex-prefix helpers.
//!
//! Hashes are always the 64-character lowercase-hex SHA-256 digest of the
//! payload bytes alone (I1) — never the filename, timestamp, or metadata.

use sha2::{Digest, Sha256};

pub const HASH_HEX_LEN: usize = 64;
pub const MIN_PREFIX_LEN: usize = 4;

pub fn hash_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(HASH_HEX_LEN);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

pub fn is_valid_full_hash(s: &str) -> bool {
    s.len() == HASH_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_hash_matches_known_vector() {
        // [1.0, 2.0, 3.0, 4.0] as little-endian float32.
        let bytes: [u8; 16] = [
            0x00, 0x00, 0x80, 0x3f, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x40, 0x40, 0x00, 0x00,
            0x80, 0x40,
        ];
        let h = hash_hex(&bytes);
        assert_eq!(h.len(), HASH_HEX_LEN);
        assert!(is_valid_full_hash(&h));
        // Same bytes always hash identically (idempotent put).
        assert_eq!(h, hash_hex(&bytes));
    }

    #[test]
    fn rejects_uppercase_and_short_hashes() {
        assert!(!is_valid_full_hash("ABCD"));
        assert!(!is_valid_full_hash("abcd"));
    }
}
