//! Provider capability set and backend selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use gitbox_common::{Error, Result};

use crate::gcm::AesGcmProvider;
use crate::secret::Secret;
use crate::secretbox::SecretboxProvider;

/// Authenticated symmetric encryption plus hashing.
///
/// Implementations are pure functions over bytes. `decrypt` must fail with
/// [`Error::AuthenticationFailure`] on any tag mismatch and never with a more
/// specific error.
pub trait E2eeProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Generate a fresh secret sized for this provider's primitive.
    fn create_secret(&self) -> Secret;

    /// Encrypt and authenticate `plaintext` under `secret`.
    ///
    /// # Errors
    /// - `Crypto` if the secret does not have this provider's key/nonce sizes
    fn encrypt(&self, plaintext: &[u8], secret: &Secret) -> Result<Vec<u8>>;

    /// Verify and decrypt `ciphertext` under `secret`.
    ///
    /// # Errors
    /// - `AuthenticationFailure` for a wrong key, wrong nonce, malformed
    ///   secret or corrupted ciphertext
    fn decrypt(&self, ciphertext: &[u8], secret: &Secret) -> Result<Vec<u8>>;

    /// 256-bit content hash.
    fn hash(&self, data: &[u8]) -> Vec<u8>;
}

/// Process-wide choice of crypto provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CryptoBackend {
    /// XSalsa20-Poly1305 secretbox with BLAKE2b-256 hashing.
    #[default]
    Secretbox,
    /// AES-256-GCM with SHA-256 hashing.
    Aes256Gcm,
}

impl CryptoBackend {
    /// Build the provider instance for this backend.
    pub fn provider(self) -> Arc<dyn E2eeProvider> {
        match self {
            CryptoBackend::Secretbox => Arc::new(SecretboxProvider::new()),
            CryptoBackend::Aes256Gcm => Arc::new(AesGcmProvider::new()),
        }
    }

    /// Config spelling of this backend.
    pub fn as_str(self) -> &'static str {
        match self {
            CryptoBackend::Secretbox => "secretbox",
            CryptoBackend::Aes256Gcm => "aes256gcm",
        }
    }
}

impl fmt::Display for CryptoBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CryptoBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "secretbox" => Ok(CryptoBackend::Secretbox),
            "aes256gcm" | "aes-256-gcm" => Ok(CryptoBackend::Aes256Gcm),
            other => Err(Error::InvalidInput(format!(
                "Unknown crypto backend '{}', use secretbox or aes256gcm",
                other
            ))),
        }
    }
}

/// Constant-time digest comparison.
pub fn digests_match(lhs: &[u8], rhs: &[u8]) -> bool {
    lhs.len() == rhs.len() && bool::from(lhs.ct_eq(rhs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digests_match() {
        assert!(digests_match(b"abc", b"abc"));
        assert!(!digests_match(b"abc", b"abd"));
        assert!(!digests_match(b"abc", b"ab"));
    }

    #[test]
    fn test_backend_parse_and_display() {
        assert_eq!("secretbox".parse::<CryptoBackend>().unwrap(), CryptoBackend::Secretbox);
        assert_eq!("AES256GCM".parse::<CryptoBackend>().unwrap(), CryptoBackend::Aes256Gcm);
        assert!("rot13".parse::<CryptoBackend>().is_err());
        assert_eq!(CryptoBackend::Aes256Gcm.to_string(), "aes256gcm");
    }

    #[test]
    fn test_backend_serde() {
        let json = serde_json::to_string(&CryptoBackend::Aes256Gcm).unwrap();
        assert_eq!(json, "\"aes256gcm\"");
        let back: CryptoBackend = serde_json::from_str("\"secretbox\"").unwrap();
        assert_eq!(back, CryptoBackend::Secretbox);
    }

    #[test]
    fn test_backend_provider_names() {
        assert_eq!(CryptoBackend::Secretbox.provider().name(), "secretbox");
        assert_eq!(CryptoBackend::Aes256Gcm.provider().name(), "aes-256-gcm");
    }
}
