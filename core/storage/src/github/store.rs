//! GitHub-backed remote store.

use async_trait::async_trait;
use tracing::debug;

use gitbox_common::{AccessToken, GitRepository, Result};

use super::client::{GitHubClient, RAW_HOST};
use crate::provider::{RawObject, RemoteStore, StoreStatus, TreeListing};

/// Remote store writing objects as commits through the contents API.
pub struct GitHubStore {
    client: GitHubClient,
}

impl GitHubStore {
    /// Create a store over the public API.
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(GitHubClient::new()?))
    }

    /// Create a store over an existing client.
    pub fn with_client(client: GitHubClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteStore for GitHubStore {
    fn name(&self) -> &str {
        "github"
    }

    fn raw_object_url(&self, repository: &GitRepository, path: &str) -> String {
        format!(
            "https://{}/{}/{}/{}/{}",
            RAW_HOST,
            repository.owner,
            repository.name,
            repository.branch,
            path.trim_start_matches('/')
        )
    }

    async fn put_object(
        &self,
        repository: &GitRepository,
        path: &str,
        content_base64: &str,
        message: &str,
        credential: &AccessToken,
    ) -> Result<StoreStatus> {
        let status = self
            .client
            .put_contents(repository, path, content_base64, message, credential)
            .await?;
        debug!(repository = %repository, path, status = status.as_u16(), "Put object");
        Ok(StoreStatus(status.as_u16()))
    }

    async fn get_object_raw(&self, url: &str) -> Result<RawObject> {
        let (status, bytes) = self.client.get_raw(url).await?;
        Ok(RawObject {
            status: status.as_u16(),
            bytes,
        })
    }

    async fn get_tree(&self, repository: &GitRepository, parent_path: &str) -> Result<TreeListing> {
        let (status, entries) = self.client.get_tree(repository, parent_path).await?;
        Ok(TreeListing {
            status: status.as_u16(),
            entries,
        })
    }

    async fn delete_object(
        &self,
        repository: &GitRepository,
        path: &str,
        revision_id: &str,
        message: &str,
        credential: &AccessToken,
    ) -> Result<StoreStatus> {
        let status = self
            .client
            .delete_contents(repository, path, revision_id, message, credential)
            .await?;
        debug!(repository = %repository, path, status = status.as_u16(), "Deleted object");
        Ok(StoreStatus(status.as_u16()))
    }
}
