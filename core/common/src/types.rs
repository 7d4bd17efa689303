//! Common types used throughout GitBox.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Identity of a hosted git repository that acts as the file drive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GitRepository {
    /// Owner login (user or organization).
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Branch that receives upload commits.
    pub branch: String,
}

impl GitRepository {
    /// Create a repository identity.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            branch: branch.into(),
        }
    }

    /// Same repository pinned to another branch.
    pub fn with_branch(&self, branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for GitRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.name, self.branch)
    }
}

/// Hosting API credential.
///
/// Zeroized on drop and never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the token value.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if the token is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_display() {
        let repo = GitRepository::new("alexrintt", "drive", "main");
        assert_eq!(repo.to_string(), "alexrintt/drive@main");
    }

    #[test]
    fn test_with_branch() {
        let repo = GitRepository::new("a", "b", "").with_branch("trunk");
        assert_eq!(repo.branch, "trunk");
        assert_eq!(repo.owner, "a");
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AccessToken::new("ghp_secret");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("ghp_secret"));
        assert_eq!(token.expose(), "ghp_secret");
    }

    #[test]
    fn test_token_serializes_transparently() {
        let token = AccessToken::new("abc");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"abc\"");
    }
}
