//! In-memory store and access checker for testing.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

use gitbox_common::{AccessToken, Error, GitRepository, Result};

use crate::github::RAW_HOST;
use crate::provider::{AccessChecker, RawObject, RemoteStore, StoreStatus, TreeEntry, TreeListing};

/// Stored object.
#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    sha: String,
}

/// In-memory remote store.
///
/// Objects are keyed by `owner/name/branch/path`, which is also the path of
/// their raw URL. All data is lost on drop.
pub struct MemoryStore {
    raw_host: String,
    objects: RwLock<HashMap<String, Entry>>,
    fail_writes_with: RwLock<Option<u16>>,
    writes: AtomicUsize,
    fetches: AtomicUsize,
}

impl MemoryStore {
    /// Create a new empty store serving raw URLs from the default raw host.
    pub fn new() -> Self {
        Self::with_raw_host(RAW_HOST)
    }

    /// Create a new empty store serving raw URLs from `raw_host`.
    pub fn with_raw_host(raw_host: impl Into<String>) -> Self {
        Self {
            raw_host: raw_host.into(),
            objects: RwLock::new(HashMap::new()),
            fail_writes_with: RwLock::new(None),
            writes: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Make every following `put_object` answer `status` (None restores success).
    pub fn fail_writes_with(&self, status: Option<u16>) {
        if let Ok(mut slot) = self.fail_writes_with.write() {
            *slot = status;
        }
    }

    /// Number of accepted object writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of raw fetches served (hits or misses).
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Raw bytes stored at `path`, if any.
    pub fn object(&self, repository: &GitRepository, path: &str) -> Option<Vec<u8>> {
        let objects = self.objects.read().ok()?;
        objects.get(&Self::key(repository, path)).map(|e| e.data.clone())
    }

    /// Overwrite stored bytes in place (for tamper tests).
    pub fn replace_object(&self, repository: &GitRepository, path: &str, data: Vec<u8>) -> Result<()> {
        let mut objects = self.lock_write()?;
        let entry = objects
            .get_mut(&Self::key(repository, path))
            .ok_or_else(|| Error::NotFound(format!("Object not found: {}", path)))?;
        entry.data = data;
        Ok(())
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(repository: &GitRepository, path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            repository.owner,
            repository.name,
            repository.branch,
            path.trim_start_matches('/')
        )
    }

    fn lock_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.objects
            .write()
            .map_err(|_| Error::Network("Memory store lock poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn raw_object_url(&self, repository: &GitRepository, path: &str) -> String {
        format!("https://{}/{}", self.raw_host, Self::key(repository, path))
    }

    async fn put_object(
        &self,
        repository: &GitRepository,
        path: &str,
        content_base64: &str,
        _message: &str,
        credential: &AccessToken,
    ) -> Result<StoreStatus> {
        if credential.is_empty() {
            return Ok(StoreStatus(401));
        }
        if let Some(status) = self.fail_writes_with.read().ok().and_then(|s| *s) {
            return Ok(StoreStatus(status));
        }

        let data = match STANDARD.decode(content_base64) {
            Ok(data) => data,
            Err(_) => return Ok(StoreStatus(422)),
        };

        let entry = Entry {
            data,
            sha: Uuid::new_v4().simple().to_string(),
        };
        let replaced = self.lock_write()?.insert(Self::key(repository, path), entry);
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(StoreStatus(if replaced.is_some() { 200 } else { 201 }))
    }

    async fn get_object_raw(&self, url: &str) -> Result<RawObject> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let parsed = url::Url::parse(url).map_err(|e| Error::Network(format!("Invalid URL: {}", e)))?;
        if parsed.host_str() != Some(self.raw_host.as_str()) {
            return Ok(RawObject {
                status: 404,
                bytes: Vec::new(),
            });
        }

        let key = parsed.path().trim_start_matches('/');
        let objects = self
            .objects
            .read()
            .map_err(|_| Error::Network("Memory store lock poisoned".to_string()))?;

        Ok(match objects.get(key) {
            Some(entry) => RawObject {
                status: 200,
                bytes: entry.data.clone(),
            },
            None => RawObject {
                status: 404,
                bytes: Vec::new(),
            },
        })
    }

    async fn get_tree(&self, repository: &GitRepository, parent_path: &str) -> Result<TreeListing> {
        let parent = parent_path.trim_matches('/');
        let prefix = if parent.is_empty() {
            Self::key(repository, "")
        } else {
            format!("{}/", Self::key(repository, parent))
        };

        let objects = self
            .objects
            .read()
            .map_err(|_| Error::Network("Memory store lock poisoned".to_string()))?;

        let entries: Vec<TreeEntry> = objects
            .iter()
            .filter_map(|(key, entry)| {
                let relative = key.strip_prefix(&prefix)?;
                // Only direct children
                (!relative.contains('/')).then(|| TreeEntry {
                    path: relative.to_string(),
                    sha: entry.sha.clone(),
                    kind: "blob".to_string(),
                })
            })
            .collect();

        if entries.is_empty() && !parent.is_empty() {
            return Ok(TreeListing {
                status: 404,
                entries,
            });
        }

        Ok(TreeListing {
            status: 200,
            entries,
        })
    }

    async fn delete_object(
        &self,
        repository: &GitRepository,
        path: &str,
        revision_id: &str,
        _message: &str,
        credential: &AccessToken,
    ) -> Result<StoreStatus> {
        if credential.is_empty() {
            return Ok(StoreStatus(401));
        }

        let key = Self::key(repository, path);
        let mut objects = self.lock_write()?;

        match objects.get(&key) {
            Some(entry) if entry.sha == revision_id => {
                objects.remove(&key);
                Ok(StoreStatus(200))
            }
            Some(_) => Ok(StoreStatus(409)),
            None => Ok(StoreStatus(404)),
        }
    }
}

/// Outcome a [`StaticAccessChecker`] answers with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Access granted; answers with this default branch.
    Allow(String),
    /// Token rejected.
    InvalidToken,
    /// Repository hidden or missing.
    PrivateOrNonExistent,
    /// Token owner is not a collaborator.
    NoWritePermission,
}

/// Access checker with a fixed answer, counting its calls.
pub struct StaticAccessChecker {
    decision: RwLock<AccessDecision>,
    calls: AtomicUsize,
}

impl StaticAccessChecker {
    /// Create a checker that always answers `decision`.
    pub fn new(decision: AccessDecision) -> Self {
        Self {
            decision: RwLock::new(decision),
            calls: AtomicUsize::new(0),
        }
    }

    /// Checker granting access with default branch `branch`.
    pub fn allow(branch: impl Into<String>) -> Self {
        Self::new(AccessDecision::Allow(branch.into()))
    }

    /// Change the answer for following calls.
    pub fn set_decision(&self, decision: AccessDecision) {
        if let Ok(mut slot) = self.decision.write() {
            *slot = decision;
        }
    }

    /// Number of checks performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessChecker for StaticAccessChecker {
    async fn check_write_access(
        &self,
        _owner: &str,
        _name: &str,
        _credential: &AccessToken,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let decision = self
            .decision
            .read()
            .map_err(|_| Error::Network("Access checker lock poisoned".to_string()))?
            .clone();

        match decision {
            AccessDecision::Allow(branch) => Ok(branch),
            AccessDecision::InvalidToken => Err(Error::InvalidToken),
            AccessDecision::PrivateOrNonExistent => Err(Error::PrivateOrNonExistentRepository),
            AccessDecision::NoWritePermission => Err(Error::UserHasNoWritePermission),
        }
    }
}
