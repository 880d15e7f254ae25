//! Credential hashing and opaque-token generation.
//!
//! Raw API keys and refresh tokens are never stored; only their SHA-256 hex
//! digests touch the database. Lookups therefore compare hashes, never
//! plaintext.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Entropy of a freshly generated opaque token, in bytes.
const OPAQUE_TOKEN_BYTES: usize = 48;

/// One-way digest used for API keys and refresh tokens.
pub fn hash_credential(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Generate a high-entropy opaque token (not a JWT), base64url-encoded.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_hex() {
        let a = hash_credential("qoa_example_key");
        let b = hash_credential("qoa_example_key");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let t1 = generate_opaque_token();
        let t2 = generate_opaque_token();
        assert_ne!(t1, t2);
        assert_eq!(t1.len(), 64); // 48 bytes, base64url, no padding
        assert!(t1.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
