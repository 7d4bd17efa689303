//! Repository write-access check against the GitHub API.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use gitbox_common::{AccessToken, Error, Result};

use super::client::GitHubClient;
use crate::provider::AccessChecker;

/// Access checker requiring a valid token, a public repository and
/// collaborator rights for the token owner.
pub struct GitHubAccessChecker {
    client: GitHubClient,
}

impl GitHubAccessChecker {
    /// Create a checker over the public API.
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(GitHubClient::new()?))
    }

    /// Create a checker over an existing client.
    pub fn with_client(client: GitHubClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AccessChecker for GitHubAccessChecker {
    async fn check_write_access(
        &self,
        owner: &str,
        name: &str,
        credential: &AccessToken,
    ) -> Result<String> {
        if credential.is_empty() {
            return Err(Error::InvalidToken);
        }

        let user = match self.client.get_user(credential).await? {
            Ok(user) => user,
            Err(status) => {
                warn!(status = status.as_u16(), "Token rejected");
                return Err(Error::InvalidToken);
            }
        };

        let repo = match self.client.get_repo(owner, name, credential).await? {
            Ok(repo) if !repo.private => repo,
            _ => return Err(Error::PrivateOrNonExistentRepository),
        };

        let collaborator = self
            .client
            .collaborator_status(owner, name, &user.login, credential)
            .await?;
        if collaborator != StatusCode::NO_CONTENT {
            return Err(Error::UserHasNoWritePermission);
        }

        debug!(owner, name, branch = %repo.default_branch, "Write access verified");
        Ok(repo.default_branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_token_is_rejected_without_request() {
        // Unroutable base: any request would fail with Network instead.
        let client = GitHubClient::with_api_base("http://127.0.0.1:9").unwrap();
        let checker = GitHubAccessChecker::with_client(client);

        let result = checker
            .check_write_access("owner", "drive", &AccessToken::new(""))
            .await;
        assert!(matches!(result, Err(Error::InvalidToken)));
    }
}
