//! Authenticated encryption using AES-256-GCM.
//!
//! The nonce lives in the secret (12 bytes, the size GCM is specified for),
//! so the output is just ciphertext with the 16-byte tag appended.
//! Hashing is SHA-256.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use sha2::{Digest, Sha256};

use gitbox_common::{Error, Result};

use crate::provider::E2eeProvider;
use crate::secret::Secret;

/// Key size for AES-256 (32 bytes).
pub const KEY_SIZE: usize = 32;

/// Nonce size for GCM (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// AES-256-GCM provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmProvider;

impl AesGcmProvider {
    /// Create a new provider.
    pub fn new() -> Self {
        Self
    }
}

impl E2eeProvider for AesGcmProvider {
    fn name(&self) -> &'static str {
        "aes-256-gcm"
    }

    fn create_secret(&self) -> Secret {
        Secret::generate(KEY_SIZE, NONCE_SIZE)
    }

    fn encrypt(&self, plaintext: &[u8], secret: &Secret) -> Result<Vec<u8>> {
        if secret.nonce().len() != NONCE_SIZE {
            return Err(Error::Crypto(format!(
                "Invalid nonce length: expected {}, got {}",
                NONCE_SIZE,
                secret.nonce().len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(secret.key()).map_err(|_| {
            Error::Crypto(format!(
                "Invalid key length: expected {}, got {}",
                KEY_SIZE,
                secret.key().len()
            ))
        })?;

        cipher
            .encrypt(Nonce::from_slice(secret.nonce()), plaintext)
            .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))
    }

    fn decrypt(&self, ciphertext: &[u8], secret: &Secret) -> Result<Vec<u8>> {
        if secret.nonce().len() != NONCE_SIZE || ciphertext.len() < TAG_SIZE {
            return Err(Error::AuthenticationFailure);
        }

        let cipher =
            Aes256Gcm::new_from_slice(secret.key()).map_err(|_| Error::AuthenticationFailure)?;

        cipher
            .decrypt(Nonce::from_slice(secret.nonce()), ciphertext)
            .map_err(|_| Error::AuthenticationFailure)
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        Sha256::digest(data).to_vec()
    }
}
