//! Password hashing.
//!
//! Plaintext passwords never reach the store: the server reduces them to
//! a fixed 32-byte BLAKE3 digest (derive-key mode with a versioned
//! context string) and persists the hex encoding.

use crate::constants::KDF_CONTEXT_PASSWORD;

/// Hash a plaintext password into the hex digest persisted by the store.
pub fn hash_password(password: &str) -> String {
    let digest = blake3::derive_key(KDF_CONTEXT_PASSWORD, password.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(hash_password("hunter2"), hash_password("hunter2"));
    }

    #[test]
    fn distinct_passwords_distinct_digests() {
        assert_ne!(hash_password("hunter2"), hash_password("hunter3"));
    }

    #[test]
    fn digest_is_hex_of_32_bytes() {
        let digest = hash_password("hunter2");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
