//! GitHub REST API client.

use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use gitbox_common::{AccessToken, Error, GitRepository, Result};

use crate::provider::TreeEntry;

/// GitHub REST API base URL.
pub const API_BASE: &str = "https://api.github.com";

/// Host serving raw repository content.
pub const RAW_HOST: &str = "raw.githubusercontent.com";

/// Media type GitHub recommends for the REST API.
const ACCEPT_JSON: &str = "application/vnd.github+json";

/// Authenticated user.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    /// Login name.
    pub login: String,
}

/// Repository metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    /// Whether the repository is private.
    #[serde(default)]
    pub private: bool,
    /// Default branch name.
    pub default_branch: String,
}

/// Tree listing response.
#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
}

#[derive(Serialize)]
struct PutContents<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
}

#[derive(Serialize)]
struct DeleteContents<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

/// GitHub API client.
///
/// Non-2xx responses are returned as status codes so callers can map them
/// to their own error kinds; only transport failures become errors here.
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    api_base: String,
}

impl GitHubClient {
    /// Create a client against the public API.
    pub fn new() -> Result<Self> {
        Self::with_api_base(API_BASE)
    }

    /// Create a client against another API base (GitHub Enterprise, mocks).
    pub fn with_api_base(api_base: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("gitbox/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn auth_header(credential: &AccessToken) -> String {
        format!("Bearer {}", credential.expose())
    }

    fn contents_url(&self, repository: &GitRepository, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            repository.owner,
            repository.name,
            path.trim_start_matches('/')
        )
    }

    /// Get the user owning `credential`.
    ///
    /// The inner `Err` carries the status of a non-200 answer.
    pub async fn get_user(
        &self,
        credential: &AccessToken,
    ) -> Result<std::result::Result<GitHubUser, StatusCode>> {
        let response = self
            .http
            .get(format!("{}/user", self.api_base))
            .header(header::AUTHORIZATION, Self::auth_header(credential))
            .header(header::ACCEPT, ACCEPT_JSON)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get user: {}", e)))?;

        Self::json_if(response, StatusCode::OK).await
    }

    /// Get repository metadata.
    pub async fn get_repo(
        &self,
        owner: &str,
        name: &str,
        credential: &AccessToken,
    ) -> Result<std::result::Result<GitHubRepo, StatusCode>> {
        let response = self
            .http
            .get(format!("{}/repos/{}/{}", self.api_base, owner, name))
            .header(header::AUTHORIZATION, Self::auth_header(credential))
            .header(header::ACCEPT, ACCEPT_JSON)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get repository: {}", e)))?;

        Self::json_if(response, StatusCode::OK).await
    }

    /// Check whether `login` is a collaborator on `owner/name` (204 when it is).
    pub async fn collaborator_status(
        &self,
        owner: &str,
        name: &str,
        login: &str,
        credential: &AccessToken,
    ) -> Result<StatusCode> {
        let response = self
            .http
            .get(format!(
                "{}/repos/{}/{}/collaborators/{}",
                self.api_base, owner, name, login
            ))
            .header(header::AUTHORIZATION, Self::auth_header(credential))
            .header(header::ACCEPT, ACCEPT_JSON)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to check collaborator: {}", e)))?;

        Ok(response.status())
    }

    /// Create or replace a file through the contents API.
    pub async fn put_contents(
        &self,
        repository: &GitRepository,
        path: &str,
        content_base64: &str,
        message: &str,
        credential: &AccessToken,
    ) -> Result<StatusCode> {
        let body = PutContents {
            message,
            content: content_base64,
            branch: &repository.branch,
        };

        let response = self
            .http
            .put(self.contents_url(repository, path))
            .header(header::AUTHORIZATION, Self::auth_header(credential))
            .header(header::ACCEPT, ACCEPT_JSON)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload object: {}", e)))?;

        Ok(response.status())
    }

    /// Delete a file through the contents API.
    pub async fn delete_contents(
        &self,
        repository: &GitRepository,
        path: &str,
        sha: &str,
        message: &str,
        credential: &AccessToken,
    ) -> Result<StatusCode> {
        let body = DeleteContents {
            message,
            sha,
            branch: &repository.branch,
        };

        let response = self
            .http
            .delete(self.contents_url(repository, path))
            .header(header::AUTHORIZATION, Self::auth_header(credential))
            .header(header::ACCEPT, ACCEPT_JSON)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to delete object: {}", e)))?;

        Ok(response.status())
    }

    /// List the tree `<branch>:<parent_path>`.
    pub async fn get_tree(
        &self,
        repository: &GitRepository,
        parent_path: &str,
    ) -> Result<(StatusCode, Vec<TreeEntry>)> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}:{}",
            self.api_base,
            repository.owner,
            repository.name,
            repository.branch,
            parent_path.trim_matches('/')
        );

        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, ACCEPT_JSON)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list tree: {}", e)))?;

        match Self::json_if::<TreeResponse>(response, StatusCode::OK).await? {
            Ok(tree) => Ok((StatusCode::OK, tree.tree)),
            Err(status) => Ok((status, Vec::new())),
        }
    }

    /// Fetch raw bytes from a URL without credentials.
    pub async fn get_raw(&self, url: &str) -> Result<(StatusCode, Vec<u8>)> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to download object: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Ok((status, Vec::new()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read object body: {}", e)))?;

        Ok((status, bytes.to_vec()))
    }

    /// Parse the body as JSON when the status is `expected`.
    async fn json_if<T: DeserializeOwned>(
        response: Response,
        expected: StatusCode,
    ) -> Result<std::result::Result<T, StatusCode>> {
        let status = response.status();
        if status != expected {
            return Ok(Err(status));
        }

        response
            .json::<T>()
            .await
            .map(Ok)
            .map_err(|e| Error::Serialization(format!("Failed to parse response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_url() {
        let client = GitHubClient::with_api_base("https://api.example.com/").unwrap();
        let repo = GitRepository::new("owner", "drive", "main");

        assert_eq!(
            client.contents_url(&repo, ".gitbox/abc"),
            "https://api.example.com/repos/owner/drive/contents/.gitbox/abc"
        );
    }

    #[test]
    fn test_repo_deserialization() {
        let json = r#"{"id":1,"private":false,"default_branch":"trunk","name":"drive"}"#;
        let repo: GitHubRepo = serde_json::from_str(json).unwrap();

        assert!(!repo.private);
        assert_eq!(repo.default_branch, "trunk");
    }

    #[test]
    fn test_tree_deserialization() {
        let json = r#"{"sha":"x","tree":[{"path":"a","mode":"100644","type":"blob","sha":"s1"}],"truncated":false}"#;
        let tree: TreeResponse = serde_json::from_str(json).unwrap();

        assert_eq!(tree.tree.len(), 1);
        assert_eq!(tree.tree[0].sha, "s1");
    }

    #[test]
    fn test_put_body_shape() {
        let body = PutContents {
            message: "Upload sent",
            content: "aGk=",
            branch: "main",
        };
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["message"], "Upload sent");
        assert_eq!(value["content"], "aGk=");
        assert_eq!(value["branch"], "main");
    }
}
