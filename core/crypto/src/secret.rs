//! Per-file secret with secure memory handling.
//!
//! A secret is generated fresh for every uploaded file and only ever leaves
//! the process inside a share link.

use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Key and nonce pair needed to open one envelope.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    key: Vec<u8>,
    nonce: Vec<u8>,
}

impl Secret {
    /// Create a secret from raw parts (for example decoded from a link).
    ///
    /// No length validation happens here: a secret of the wrong shape fails
    /// later as a key mismatch or authentication failure.
    pub fn from_parts(key: Vec<u8>, nonce: Vec<u8>) -> Self {
        Self { key, nonce }
    }

    /// Generate a random secret with the given key and nonce sizes.
    pub fn generate(key_len: usize, nonce_len: usize) -> Self {
        Self {
            key: random_bytes(key_len),
            nonce: random_bytes(nonce_len),
        }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Get the nonce bytes.
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sizes() {
        let secret = Secret::generate(32, 24);
        assert_eq!(secret.key().len(), 32);
        assert_eq!(secret.nonce().len(), 24);
    }

    #[test]
    fn test_generate_is_random() {
        let s1 = Secret::generate(32, 12);
        let s2 = Secret::generate(32, 12);

        assert_ne!(s1.key(), s2.key());
        assert_ne!(s1.nonce(), s2.nonce());
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = Secret::from_parts(vec![0xAA; 4], vec![0xBB; 4]);
        assert_eq!(format!("{:?}", secret), "Secret([REDACTED])");
    }
}
