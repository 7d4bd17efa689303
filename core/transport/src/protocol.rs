//! Upload, download and delete of shared files.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use tracing::{debug, info, warn};

use gitbox_common::{AccessToken, Error, GitRepository, Result};
use gitbox_crypto::{digests_match, E2eeProvider, Secret};
use gitbox_storage::{AccessChecker, RemoteStore};

use crate::config::TransportConfig;
use crate::envelope::Envelope;
use crate::link::{build_share_link, LinkValidator};
use crate::sanitize::{sanitize_filename, sanitize_repository};

/// A file recovered from a share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Original (sanitized at upload) file name.
    pub name: String,
    /// Plaintext content.
    pub content: Vec<u8>,
}

/// An encrypted file ready to be written to the remote store.
#[derive(Debug, Clone)]
pub struct SealedFile {
    /// Encoded envelope.
    pub envelope: Vec<u8>,
    /// Content-addressed remote path.
    pub path: String,
    /// Secret the envelope was sealed with.
    pub secret: Secret,
}

/// Encrypted transport between local files and a git-hosted repository.
///
/// Every collaborator is injected: the crypto provider, the remote store and
/// the access checker. The transport never retries; retry policy belongs to
/// the caller.
pub struct GitBoxTransport {
    config: TransportConfig,
    provider: Arc<dyn E2eeProvider>,
    store: Arc<dyn RemoteStore>,
    access: Arc<dyn AccessChecker>,
    validator: LinkValidator,
}

impl GitBoxTransport {
    /// Create a transport with an explicit provider.
    pub fn new(
        config: TransportConfig,
        provider: Arc<dyn E2eeProvider>,
        store: Arc<dyn RemoteStore>,
        access: Arc<dyn AccessChecker>,
    ) -> Self {
        let validator = LinkValidator::from_config(&config);
        Self {
            config,
            provider,
            store,
            access,
            validator,
        }
    }

    /// Create a transport using the provider selected by `config.crypto_backend`.
    pub fn from_config(
        config: TransportConfig,
        store: Arc<dyn RemoteStore>,
        access: Arc<dyn AccessChecker>,
    ) -> Self {
        let provider = config.crypto_backend.provider();
        Self::new(config, provider, store, access)
    }

    /// Active configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Link validator built from the configuration.
    pub fn validator(&self) -> &LinkValidator {
        &self.validator
    }

    /// Encrypt `content` and `name` under a fresh secret and build the envelope.
    ///
    /// `name` is used as given; callers sanitize it first.
    pub fn seal(&self, name: &str, content: &[u8]) -> Result<SealedFile> {
        let secret = self.provider.create_secret();

        let envelope = Envelope {
            key_hash: self.provider.hash(secret.key()),
            nonce_hash: self.provider.hash(secret.nonce()),
            enc_filename: self.provider.encrypt(name.as_bytes(), &secret)?,
            enc_content: self.provider.encrypt(content, &secret)?,
        }
        .encode()?;

        let path = self.config.object_path(&hex::encode(self.provider.hash(&envelope)));

        Ok(SealedFile {
            envelope,
            path,
            secret,
        })
    }

    /// Verify the secret against the envelope hashes, then decrypt.
    ///
    /// # Errors
    /// - `TruncatedEnvelope` if the bytes are not a complete envelope
    /// - `KeyMismatch` if either hash differs; nothing is decrypted then
    /// - `AuthenticationFailure` if a ciphertext was corrupted
    pub fn open_envelope(&self, bytes: &[u8], secret: &Secret) -> Result<DownloadedFile> {
        let envelope = Envelope::decode(bytes)?;

        let key_matches = digests_match(&self.provider.hash(secret.key()), &envelope.key_hash);
        let nonce_matches =
            digests_match(&self.provider.hash(secret.nonce()), &envelope.nonce_hash);
        if !(key_matches && nonce_matches) {
            return Err(Error::KeyMismatch);
        }

        let name = self.provider.decrypt(&envelope.enc_filename, secret)?;
        let content = self.provider.decrypt(&envelope.enc_content, secret)?;

        Ok(DownloadedFile {
            name: String::from_utf8_lossy(&name).into_owned(),
            content,
        })
    }

    /// Encrypt a file, store it in `repository` and return its share link.
    ///
    /// When `repository.branch` is empty the default branch reported by the
    /// access check is used.
    ///
    /// # Errors
    /// - Access check errors, unchanged
    /// - `UploadFailed` if the store answers non-2xx
    pub async fn generate_share_link(
        &self,
        name: &str,
        content: &[u8],
        repository: &GitRepository,
        credential: &AccessToken,
    ) -> Result<String> {
        let mut repository = sanitize_repository(repository);
        let name = sanitize_filename(name);

        debug!(provider = self.provider.name(), size = content.len(), "Sealing file");
        let sealed = self.seal(&name, content)?;

        let default_branch = self
            .access
            .check_write_access(&repository.owner, &repository.name, credential)
            .await?;
        if repository.branch.is_empty() {
            repository.branch = default_branch;
        }

        let status = self
            .store
            .put_object(
                &repository,
                &sealed.path,
                &STANDARD.encode(&sealed.envelope),
                &self.config.commit_message,
                credential,
            )
            .await?;
        if !status.is_success() {
            warn!(repository = %repository, status = status.code(), "Upload rejected");
            return Err(Error::UploadFailed {
                status: status.code(),
            });
        }

        let location = self.store.raw_object_url(&repository, &sealed.path);
        info!(repository = %repository, path = %sealed.path, "File uploaded");

        Ok(build_share_link(&self.config.app_url, &location, &sealed.secret))
    }

    /// Validate a share link, fetch its envelope and decrypt it.
    ///
    /// # Errors
    /// - Link validation errors (before any fetch)
    /// - `InvalidDownloadUrl` if the fetch is not 200
    /// - Envelope errors from [`open_envelope`](Self::open_envelope)
    pub async fn resolve_share_link(&self, link: &str) -> Result<DownloadedFile> {
        let share = self.validator.parse_share_link(link)?;

        let raw = self.store.get_object_raw(share.location.as_str()).await?;
        if raw.status != 200 {
            return Err(Error::InvalidDownloadUrl { status: raw.status });
        }

        let file = self.open_envelope(&raw.bytes, &share.secret)?;
        debug!(size = file.content.len(), "File downloaded");
        Ok(file)
    }

    /// Remove the object a share link points at.
    ///
    /// This is a new commit; the repository history still holds the envelope.
    ///
    /// # Errors
    /// - Link validation errors
    /// - Access check errors, unchanged
    /// - `InvalidFilePath` if the object is not in the repository tree
    /// - `DeleteFailed` if the store answers non-2xx
    pub async fn delete_shared_object(&self, link: &str, credential: &AccessToken) -> Result<()> {
        let location = self.validator.parse_object_location(link)?;
        let repository = &location.repository;

        self.access
            .check_write_access(&repository.owner, &repository.name, credential)
            .await?;

        let parent = location.parent_path();
        let tree = self.store.get_tree(repository, &parent).await?;
        let revision = match tree.find(location.file_name()) {
            Some(entry) if (200..300).contains(&tree.status) => entry.sha.clone(),
            _ => {
                return Err(Error::InvalidFilePath(format!(
                    "{}:{}",
                    repository.branch, parent
                )))
            }
        };

        let path = location.path();
        let status = self
            .store
            .delete_object(
                repository,
                &path,
                &revision,
                &format!("Delete {}", path),
                credential,
            )
            .await?;
        if !status.is_success() {
            return Err(Error::DeleteFailed {
                status: status.code(),
            });
        }

        info!(repository = %repository, path = %path, "Object deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitbox_crypto::{CryptoBackend, SecretboxProvider};
    use gitbox_storage::{AccessDecision, MemoryStore, StaticAccessChecker};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider wrapper counting decrypt calls.
    struct CountingProvider {
        inner: SecretboxProvider,
        decrypts: AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                inner: SecretboxProvider::new(),
                decrypts: AtomicUsize::new(0),
            }
        }
    }

    impl E2eeProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn create_secret(&self) -> Secret {
            self.inner.create_secret()
        }

        fn encrypt(&self, plaintext: &[u8], secret: &Secret) -> Result<Vec<u8>> {
            self.inner.encrypt(plaintext, secret)
        }

        fn decrypt(&self, ciphertext: &[u8], secret: &Secret) -> Result<Vec<u8>> {
            self.decrypts.fetch_add(1, Ordering::SeqCst);
            self.inner.decrypt(ciphertext, secret)
        }

        fn hash(&self, data: &[u8]) -> Vec<u8> {
            self.inner.hash(data)
        }
    }

    struct Fixture {
        transport: GitBoxTransport,
        provider: Arc<CountingProvider>,
        store: Arc<MemoryStore>,
        access: Arc<StaticAccessChecker>,
    }

    fn fixture() -> Fixture {
        let provider = Arc::new(CountingProvider::new());
        let store = Arc::new(MemoryStore::new());
        let access = Arc::new(StaticAccessChecker::allow("main"));
        let transport = GitBoxTransport::new(
            TransportConfig::default(),
            provider.clone(),
            store.clone(),
            access.clone(),
        );
        Fixture {
            transport,
            provider,
            store,
            access,
        }
    }

    fn repo() -> GitRepository {
        GitRepository::new("alexrintt", "drive", "main")
    }

    fn token() -> AccessToken {
        AccessToken::new("ghp_test")
    }

    /// Repository path of the object a link points at.
    fn object_path(transport: &GitBoxTransport, link: &str) -> String {
        transport.validator().parse_object_location(link).unwrap().path()
    }

    #[test]
    fn test_seal_and_open_hello() {
        let f = fixture();
        let sealed = f.transport.seal("notes.txt", b"hello").unwrap();

        let file = f.transport.open_envelope(&sealed.envelope, &sealed.secret).unwrap();
        assert_eq!(
            file,
            DownloadedFile {
                name: "notes.txt".to_string(),
                content: b"hello".to_vec(),
            }
        );
    }

    #[test]
    fn test_path_is_hash_of_envelope() {
        let f = fixture();
        let sealed = f.transport.seal("notes.txt", b"hello").unwrap();

        let digest = hex::encode(f.provider.hash(&sealed.envelope));
        assert_eq!(sealed.path, format!(".gitbox/{}", digest));
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn test_swapped_secret_is_key_mismatch_without_decrypt() {
        let f = fixture();
        let sealed = f.transport.seal("notes.txt", b"hello").unwrap();
        let swapped = Secret::from_parts(
            sealed.secret.nonce().to_vec(),
            sealed.secret.key().to_vec(),
        );

        assert!(matches!(
            f.transport.open_envelope(&sealed.envelope, &swapped),
            Err(Error::KeyMismatch)
        ));
        assert_eq!(f.provider.decrypts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_foreign_secret_is_key_mismatch() {
        let f = fixture();
        let sealed = f.transport.seal("notes.txt", b"hello").unwrap();
        let other = f.provider.create_secret();

        assert!(matches!(
            f.transport.open_envelope(&sealed.envelope, &other),
            Err(Error::KeyMismatch)
        ));
        assert_eq!(f.provider.decrypts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tampered_content_is_authentication_failure() {
        let f = fixture();
        let sealed = f.transport.seal("notes.txt", b"hello").unwrap();
        let mut bytes = sealed.envelope.clone();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert!(matches!(
            f.transport.open_envelope(&bytes, &sealed.secret),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_tampered_filename_is_authentication_failure() {
        let f = fixture();
        let sealed = f.transport.seal("notes.txt", b"hello").unwrap();
        let envelope = Envelope::decode(&sealed.envelope).unwrap();
        let mut tampered = envelope.clone();
        tampered.enc_filename[0] ^= 0x80;

        assert!(matches!(
            f.transport.open_envelope(&tampered.encode().unwrap(), &sealed.secret),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_truncated_envelope() {
        let f = fixture();
        let sealed = f.transport.seal("notes.txt", b"hello").unwrap();

        assert!(matches!(
            f.transport.open_envelope(&sealed.envelope[..40], &sealed.secret),
            Err(Error::TruncatedEnvelope { .. })
        ));
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let f = fixture();
        let link = f
            .transport
            .generate_share_link("notes.txt", b"hello", &repo(), &token())
            .await
            .unwrap();

        assert!(link.starts_with("https://alexrintt.io/gitbox/#/download?location="));
        assert_eq!(f.store.write_count(), 1);
        assert_eq!(f.access.calls(), 1);

        let file = f.transport.resolve_share_link(&link).await.unwrap();
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.content, b"hello");
    }

    #[tokio::test]
    async fn test_stored_object_is_content_addressed() {
        let f = fixture();
        let link = f
            .transport
            .generate_share_link("notes.txt", b"hello", &repo(), &token())
            .await
            .unwrap();

        let path = object_path(&f.transport, &link);
        let stored = f.store.object(&repo(), &path).unwrap();
        assert_eq!(path, format!(".gitbox/{}", hex::encode(f.provider.hash(&stored))));
        // The plaintext never reaches the store.
        assert!(!stored.windows(5).any(|w| w == b"hello"));
    }

    #[tokio::test]
    async fn test_upload_sanitizes_name_and_repository() {
        let f = fixture();
        let unsafe_repo = GitRepository::new("alex-rintt", "My Drive", "main");
        let link = f
            .transport
            .generate_share_link("../secret?.txt", b"x", &unsafe_repo, &token())
            .await
            .unwrap();

        let location = f.transport.validator().parse_object_location(&link).unwrap();
        assert_eq!(location.repository, GitRepository::new("alexrintt", "my-drive", "main"));

        let file = f.transport.resolve_share_link(&link).await.unwrap();
        assert_eq!(file.name, "-secret-.txt");
    }

    #[tokio::test]
    async fn test_empty_branch_uses_default_branch() {
        let f = fixture();
        f.access.set_decision(AccessDecision::Allow("trunk".to_string()));

        let link = f
            .transport
            .generate_share_link("a.txt", b"data", &repo().with_branch(""), &token())
            .await
            .unwrap();

        let location = f.transport.validator().parse_object_location(&link).unwrap();
        assert_eq!(location.repository.branch, "trunk");
    }

    #[tokio::test]
    async fn test_access_error_propagates_and_nothing_is_written() {
        let f = fixture();
        f.access.set_decision(AccessDecision::PrivateOrNonExistent);

        let result = f
            .transport
            .generate_share_link("a.txt", b"data", &repo(), &token())
            .await;

        assert!(matches!(result, Err(Error::PrivateOrNonExistentRepository)));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_write_is_upload_failed() {
        let f = fixture();
        f.store.fail_writes_with(Some(409));

        let result = f
            .transport
            .generate_share_link("a.txt", b"data", &repo(), &token())
            .await;

        assert!(matches!(result, Err(Error::UploadFailed { status: 409 })));
    }

    #[tokio::test]
    async fn test_missing_object_is_invalid_download_url() {
        let f = fixture();
        let secret = f.provider.create_secret();
        let link = build_share_link(
            "https://alexrintt.io/gitbox",
            "https://raw.githubusercontent.com/alexrintt/drive/main/.gitbox/missing",
            &secret,
        );

        assert!(matches!(
            f.transport.resolve_share_link(&link).await,
            Err(Error::InvalidDownloadUrl { status: 404 })
        ));
    }

    #[tokio::test]
    async fn test_untrusted_location_is_never_fetched() {
        let f = fixture();
        let secret = f.provider.create_secret();
        let link = build_share_link("https://alexrintt.io/gitbox", "https://evil.example/f", &secret);

        assert!(matches!(
            f.transport.resolve_share_link(&link).await,
            Err(Error::UnexpectedHostname(_))
        ));
        assert_eq!(f.store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_swapped_link_is_key_mismatch() {
        let f = fixture();
        let link = f
            .transport
            .generate_share_link("notes.txt", b"hello", &repo(), &token())
            .await
            .unwrap();

        let share = f.transport.validator().parse_share_link(&link).unwrap();
        let swapped = Secret::from_parts(share.secret.nonce().to_vec(), share.secret.key().to_vec());
        let swapped_link = build_share_link(&f.transport.config().app_url, share.location.as_str(), &swapped);

        assert!(matches!(
            f.transport.resolve_share_link(&swapped_link).await,
            Err(Error::KeyMismatch)
        ));
        assert_eq!(f.provider.decrypts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupted_remote_object() {
        let f = fixture();
        let link = f
            .transport
            .generate_share_link("notes.txt", b"hello", &repo(), &token())
            .await
            .unwrap();

        let path = object_path(&f.transport, &link);
        let mut stored = f.store.object(&repo(), &path).unwrap();
        let last = stored.len() - 1;
        stored[last] ^= 0xFF;
        f.store.replace_object(&repo(), &path, stored).unwrap();

        assert!(matches!(
            f.transport.resolve_share_link(&link).await,
            Err(Error::AuthenticationFailure)
        ));
    }

    #[tokio::test]
    async fn test_delete_shared_object() {
        let f = fixture();
        let link = f
            .transport
            .generate_share_link("notes.txt", b"hello", &repo(), &token())
            .await
            .unwrap();

        f.transport.delete_shared_object(&link, &token()).await.unwrap();
        assert!(f.store.is_empty());
        assert_eq!(f.access.calls(), 2);

        assert!(matches!(
            f.transport.resolve_share_link(&link).await,
            Err(Error::InvalidDownloadUrl { status: 404 })
        ));
        assert!(matches!(
            f.transport.delete_shared_object(&link, &token()).await,
            Err(Error::InvalidFilePath(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_write_access() {
        let f = fixture();
        let link = f
            .transport
            .generate_share_link("notes.txt", b"hello", &repo(), &token())
            .await
            .unwrap();

        f.access.set_decision(AccessDecision::NoWritePermission);
        assert!(matches!(
            f.transport.delete_shared_object(&link, &token()).await,
            Err(Error::UserHasNoWritePermission)
        ));
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_rejected_by_store() {
        let f = fixture();
        let link = f
            .transport
            .generate_share_link("notes.txt", b"hello", &repo(), &token())
            .await
            .unwrap();

        assert!(matches!(
            f.transport.delete_shared_object(&link, &AccessToken::new("")).await,
            Err(Error::DeleteFailed { status: 401 })
        ));
    }

    #[tokio::test]
    async fn test_aes_gcm_backend() {
        let config = TransportConfig {
            crypto_backend: CryptoBackend::Aes256Gcm,
            ..TransportConfig::default()
        };
        let transport = GitBoxTransport::from_config(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(StaticAccessChecker::allow("main")),
        );

        let link = transport
            .generate_share_link("report.pdf", b"%PDF-1.7", &repo(), &token())
            .await
            .unwrap();
        let share = transport.validator().parse_share_link(&link).unwrap();
        assert_eq!(share.secret.nonce().len(), 12);

        let file = transport.resolve_share_link(&link).await.unwrap();
        assert_eq!(file.name, "report.pdf");
        assert_eq!(file.content, b"%PDF-1.7");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_seal_open_recovers_input(
                content in proptest::collection::vec(any::<u8>(), 0..2048),
                name in "[a-zA-Z0-9 _-]{1,40}\\.[a-z]{1,4}",
            ) {
                let f = fixture();
                let sealed = f.transport.seal(&name, &content).unwrap();
                let file = f.transport.open_envelope(&sealed.envelope, &sealed.secret).unwrap();

                prop_assert_eq!(file.name, name);
                prop_assert_eq!(file.content, content);
            }

            #[test]
            fn prop_bit_flip_after_header_hashes_is_rejected(
                content in proptest::collection::vec(any::<u8>(), 1..256),
                index in any::<prop::sample::Index>(),
                bit in 0u8..8,
            ) {
                let f = fixture();
                let sealed = f.transport.seal("notes.txt", &content).unwrap();
                let mut bytes = sealed.envelope.clone();

                // Flip inside encFilename or encFileContent only.
                let start = crate::envelope::HEADER_SIZE + 64;
                let i = start + index.index(bytes.len() - start);
                bytes[i] ^= 1 << bit;

                prop_assert!(matches!(
                    f.transport.open_envelope(&bytes, &sealed.secret),
                    Err(Error::AuthenticationFailure)
                ));
            }
        }
    }
}
