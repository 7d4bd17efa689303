//! Transport configuration.

use serde::{Deserialize, Serialize};

use gitbox_crypto::CryptoBackend;

/// Default application URL share links point at.
pub const DEFAULT_APP_URL: &str = "https://alexrintt.io/gitbox";

/// Default host the client expects to be served from.
pub const DEFAULT_EXPECTED_HOST: &str = "alexrintt.io";

/// Default directory holding envelopes inside the repository.
pub const DEFAULT_OBJECT_DIR: &str = ".gitbox";

/// Default commit message for uploads.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Upload sent";

/// Transport configuration.
///
/// Missing fields deserialize to their defaults, so a partial JSON object
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Application URL; share links are `app_url + "/#/download?..."`.
    pub app_url: String,
    /// Hostname share links must carry.
    pub expected_host: String,
    /// Hosts raw objects may be fetched from.
    pub trusted_raw_hosts: Vec<String>,
    /// Crypto provider used for every file.
    pub crypto_backend: CryptoBackend,
    /// Repository directory receiving envelopes.
    pub object_dir: String,
    /// Commit message for uploads.
    pub commit_message: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            app_url: DEFAULT_APP_URL.to_string(),
            expected_host: DEFAULT_EXPECTED_HOST.to_string(),
            trusted_raw_hosts: vec!["raw.githubusercontent.com".to_string()],
            crypto_backend: CryptoBackend::default(),
            object_dir: DEFAULT_OBJECT_DIR.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }
}

impl TransportConfig {
    /// Remote path for an envelope with hex digest `digest_hex`.
    pub fn object_path(&self, digest_hex: &str) -> String {
        format!("{}/{}", self.object_dir.trim_end_matches('/'), digest_hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();

        assert_eq!(config.expected_host, "alexrintt.io");
        assert_eq!(config.trusted_raw_hosts, vec!["raw.githubusercontent.com"]);
        assert_eq!(config.crypto_backend, CryptoBackend::Secretbox);
        assert_eq!(config.object_path("ab12"), ".gitbox/ab12");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"crypto_backend":"aes256gcm"}"#).unwrap();

        assert_eq!(config.crypto_backend, CryptoBackend::Aes256Gcm);
        assert_eq!(config.app_url, DEFAULT_APP_URL);
        assert_eq!(config.commit_message, "Upload sent");
    }
}
