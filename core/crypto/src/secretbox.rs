//! Authenticated encryption using the XSalsa20-Poly1305 secretbox.
//!
//! Output layout is the classic NaCl `crypto_secretbox_easy` form:
//! a 16-byte Poly1305 tag followed by the ciphertext. Hashing is unkeyed
//! BLAKE2b with a 32-byte digest.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use dryoc::classic::crypto_secretbox::{
    crypto_secretbox_easy, crypto_secretbox_open_easy, Key, Nonce,
};
use dryoc::constants::{
    CRYPTO_SECRETBOX_KEYBYTES, CRYPTO_SECRETBOX_MACBYTES, CRYPTO_SECRETBOX_NONCEBYTES,
};
use zeroize::Zeroize;

use gitbox_common::{Error, Result};

use crate::provider::E2eeProvider;
use crate::secret::Secret;

/// Key size for the secretbox (32 bytes).
pub const KEY_SIZE: usize = CRYPTO_SECRETBOX_KEYBYTES;

/// Nonce size for the secretbox (24 bytes).
pub const NONCE_SIZE: usize = CRYPTO_SECRETBOX_NONCEBYTES;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = CRYPTO_SECRETBOX_MACBYTES;

/// XSalsa20-Poly1305 provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct SecretboxProvider;

impl SecretboxProvider {
    /// Create a new provider.
    pub fn new() -> Self {
        Self
    }

    fn key_and_nonce(secret: &Secret) -> Option<(Key, Nonce)> {
        let key: Key = secret.key().try_into().ok()?;
        let nonce: Nonce = secret.nonce().try_into().ok()?;
        Some((key, nonce))
    }
}

impl E2eeProvider for SecretboxProvider {
    fn name(&self) -> &'static str {
        "secretbox"
    }

    fn create_secret(&self) -> Secret {
        Secret::generate(KEY_SIZE, NONCE_SIZE)
    }

    /// Encrypt plaintext with the secretbox.
    ///
    /// # Postconditions
    /// - Returns tag || ciphertext
    /// - The output length is plaintext length + TAG_SIZE
    ///
    /// # Errors
    /// - Returns `Crypto` if the key or nonce length is incorrect
    fn encrypt(&self, plaintext: &[u8], secret: &Secret) -> Result<Vec<u8>> {
        let (mut key, nonce) = Self::key_and_nonce(secret).ok_or_else(|| {
            Error::Crypto(format!(
                "Invalid secret: expected {}-byte key and {}-byte nonce, got {} and {}",
                KEY_SIZE,
                NONCE_SIZE,
                secret.key().len(),
                secret.nonce().len()
            ))
        })?;

        let mut ciphertext = vec![0u8; plaintext.len() + TAG_SIZE];
        let sealed = crypto_secretbox_easy(&mut ciphertext, plaintext, &nonce, &key);
        key.zeroize();

        sealed.map_err(|e| Error::Crypto(format!("Encryption failed: {:?}", e)))?;
        Ok(ciphertext)
    }

    /// Decrypt a secretbox.
    ///
    /// # Security
    /// - Authenticates before decrypting
    /// - Every failure is reported as `AuthenticationFailure`
    fn decrypt(&self, ciphertext: &[u8], secret: &Secret) -> Result<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(Error::AuthenticationFailure);
        }

        let (mut key, nonce) =
            Self::key_and_nonce(secret).ok_or(Error::AuthenticationFailure)?;

        let mut plaintext = vec![0u8; ciphertext.len() - TAG_SIZE];
        let opened = crypto_secretbox_open_easy(&mut plaintext, ciphertext, &nonce, &key);
        key.zeroize();

        match opened {
            Ok(()) => Ok(plaintext),
            Err(_) => {
                plaintext.zeroize();
                Err(Error::AuthenticationFailure)
            }
        }
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(data);
        hasher.finalize().to_vec()
    }
}
