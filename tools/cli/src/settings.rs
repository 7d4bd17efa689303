//! Persistent CLI settings.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use gitbox_common::{AccessToken, GitRepository};
use gitbox_transport::{is_valid_repo_name, is_valid_username, TransportConfig};

/// Environment variable overriding the stored token.
pub const TOKEN_ENV: &str = "GITBOX_TOKEN";

/// Settings stored in `<config_dir>/gitbox/settings.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Verified target repository.
    #[serde(default)]
    pub repository: Option<GitRepository>,
    /// Hosting API token.
    #[serde(default)]
    pub token: AccessToken,
    /// Transport options.
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Settings {
    /// Default settings file location.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("No configuration directory on this platform")?;
        Ok(dir.join("gitbox").join("settings.json"))
    }

    /// Load settings; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    /// Write settings, readable by the owner only on Unix.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict {}", path.display()))?;
        }

        Ok(())
    }

    /// Token to use: `GITBOX_TOKEN` when set, else the stored one.
    pub fn token(&self) -> AccessToken {
        match std::env::var(TOKEN_ENV) {
            Ok(token) if !token.is_empty() => AccessToken::new(token),
            _ => self.token.clone(),
        }
    }

    /// Configured repository, or an error telling the user how to set one.
    pub fn require_repository(&self) -> Result<&GitRepository> {
        self.repository
            .as_ref()
            .context("No repository configured, run `gitbox settings set --repo <url>` first")
    }
}

/// Parse `https://github.com/<owner>/<repo>` (optionally `.git`) or `<owner>/<repo>`.
pub fn parse_repository_url(input: &str) -> Result<(String, String)> {
    let input = input.trim();
    let path = match Url::parse(input) {
        Ok(url) => {
            if url.host_str() != Some("github.com") {
                bail!("Repository URL must point at github.com: {}", input);
            }
            url.path().to_string()
        }
        Err(_) => input.to_string(),
    };

    let mut parts = path.trim_matches('/').split('/');
    let (Some(owner), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
        bail!("Expected <owner>/<repository>, got {}", input);
    };
    let name = name.strip_suffix(".git").unwrap_or(name);

    if !is_valid_username(owner) {
        bail!("Invalid repository owner: {}", owner);
    }
    if !is_valid_repo_name(name) {
        bail!("Invalid repository name: {}", name);
    }

    Ok((owner.to_string(), name.to_string()))
}
