//! Encrypted transport between local files and a git-hosted repository.
//!
//! This crate provides:
//! - The envelope codec bundling integrity hashes with encrypted name and content
//! - Share link construction and validation of untrusted links
//! - Sanitization of repository identities and file names
//! - [`GitBoxTransport`], which uploads, downloads and deletes shared files
//!
//! # Security Guarantees
//! - Links are validated (origin, https, trusted host, payload shape) before
//!   anything is fetched or decrypted
//! - A wrong secret is detected from the envelope hashes and never reaches
//!   the decrypt primitive
//! - Secrets and links are never logged

pub mod config;
pub mod envelope;
pub mod link;
pub mod protocol;
pub mod sanitize;

pub use config::TransportConfig;
pub use envelope::Envelope;
pub use link::{build_share_link, is_base64, LinkValidator, ObjectLocation, ShareLink};
pub use protocol::{DownloadedFile, GitBoxTransport, SealedFile};
pub use sanitize::{
    is_valid_repo_name, is_valid_username, sanitize_filename, sanitize_repository,
};
