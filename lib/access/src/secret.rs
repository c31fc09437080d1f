//! Opaque bearer secrets and their one-way digests.
//!
//! A secret is the only thing a client ever holds; the database only ever
//! sees its digest. Lookup and verification always compare digests, never
//! plaintext.

use base64::Engine;
use rand::TryRngCore;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Number of random bytes in a generated secret.
const SECRET_BYTES: usize = 32;

/// Generates a new URL-safe, base64-encoded secret from the OS random source.
///
/// # Panics
///
/// Panics if the secure random source is unavailable. A host without secure
/// randomness cannot safely issue credentials, so this is fatal by design.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .expect("secure random source unavailable");
    base64::engine::general_purpose::URL_SAFE.encode(bytes)
}

/// Computes the lowercase hex SHA-256 digest of a secret.
///
/// Deterministic: the same plaintext always yields the same digest, which is
/// what makes digest-keyed lookup possible.
#[must_use]
pub fn digest(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    let output = hasher.finalize();

    let mut hex = String::with_capacity(output.len() * 2);
    for byte in output {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_are_distinct() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn generated_secret_encodes_32_bytes() {
        // 32 bytes of padded base64 is 44 characters.
        assert_eq!(generate_secret().len(), 44);
    }

    #[test]
    fn generated_secret_is_url_safe() {
        let secret = generate_secret();
        assert!(
            secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '=')
        );
    }

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(digest("some-secret"), digest("some-secret"));
    }

    #[test]
    fn digest_differs_across_inputs() {
        assert_ne!(digest("secret-a"), digest("secret-b"));
    }

    #[test]
    fn digest_is_64_hex_chars() {
        let d = digest("anything");
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(d, d.to_lowercase());
    }

    #[test]
    fn digest_matches_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
