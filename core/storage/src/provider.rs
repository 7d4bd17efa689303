//! Remote object store and repository access check interfaces.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gitbox_common::{AccessToken, GitRepository, Result};

/// HTTP-like status returned by a store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStatus(pub u16);

impl StoreStatus {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Raw status code.
    pub fn code(&self) -> u16 {
        self.0
    }
}

/// Response of a raw object fetch.
#[derive(Debug, Clone)]
pub struct RawObject {
    /// Status code of the fetch.
    pub status: u16,
    /// Body bytes (empty unless the fetch succeeded).
    pub bytes: Vec<u8>,
}

/// One entry of a repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Entry name relative to the listed directory.
    pub path: String,
    /// Storage-internal revision identifier (blob sha).
    pub sha: String,
    /// Entry kind (`blob` or `tree`).
    #[serde(rename = "type")]
    pub kind: String,
}

/// Response of a tree listing.
#[derive(Debug, Clone)]
pub struct TreeListing {
    /// Status code of the listing.
    pub status: u16,
    /// Entries (empty unless the listing succeeded).
    pub entries: Vec<TreeEntry>,
}

impl TreeListing {
    /// Find an entry by name.
    pub fn find(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.path == name)
    }
}

/// Remote object store backing a repository.
///
/// Paths are relative to the repository root. Every write becomes a new
/// commit on `repository.branch`; the store's history may keep old objects.
/// Non-2xx responses are reported as statuses, transport failures as
/// `Error::Network`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Get the store name (e.g., "github", "memory").
    fn name(&self) -> &str;

    /// Public URL serving the raw bytes of `path`.
    fn raw_object_url(&self, repository: &GitRepository, path: &str) -> String;

    /// Create or replace the object at `path`.
    ///
    /// # Preconditions
    /// - `content_base64` is the standard-alphabet base64 of the object bytes
    async fn put_object(
        &self,
        repository: &GitRepository,
        path: &str,
        content_base64: &str,
        message: &str,
        credential: &AccessToken,
    ) -> Result<StoreStatus>;

    /// Fetch raw object bytes from a raw URL.
    async fn get_object_raw(&self, url: &str) -> Result<RawObject>;

    /// List the directory `parent_path` (empty for root) at `repository.branch`.
    async fn get_tree(&self, repository: &GitRepository, parent_path: &str) -> Result<TreeListing>;

    /// Remove the object at `path`, identified by its current revision.
    async fn delete_object(
        &self,
        repository: &GitRepository,
        path: &str,
        revision_id: &str,
        message: &str,
        credential: &AccessToken,
    ) -> Result<StoreStatus>;
}

/// Repository write-access check.
#[async_trait]
pub trait AccessChecker: Send + Sync {
    /// Verify that `credential` can push to `owner/name`.
    ///
    /// # Returns
    /// The repository's default branch.
    ///
    /// # Errors
    /// - `InvalidToken`
    /// - `PrivateOrNonExistentRepository`
    /// - `UserHasNoWritePermission`
    async fn check_write_access(
        &self,
        owner: &str,
        name: &str,
        credential: &AccessToken,
    ) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_status() {
        assert!(StoreStatus(201).is_success());
        assert!(StoreStatus(200).is_success());
        assert!(!StoreStatus(409).is_success());
        assert_eq!(StoreStatus(422).code(), 422);
    }

    #[test]
    fn test_tree_entry_serialization() {
        let json = r#"{"path":"abc","mode":"100644","type":"blob","sha":"deadbeef","size":3}"#;
        let entry: TreeEntry = serde_json::from_str(json).unwrap();

        assert_eq!(entry.path, "abc");
        assert_eq!(entry.kind, "blob");
        assert_eq!(entry.sha, "deadbeef");
    }

    #[test]
    fn test_tree_listing_find() {
        let listing = TreeListing {
            status: 200,
            entries: vec![TreeEntry {
                path: "a".to_string(),
                sha: "1".to_string(),
                kind: "blob".to_string(),
            }],
        };
        assert_eq!(listing.find("a").map(|e| e.sha.as_str()), Some("1"));
        assert!(listing.find("b").is_none());
    }
}
