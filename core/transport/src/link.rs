//! Share link construction and validation.
//!
//! A share link looks like
//! `https://<app>/#/download?location=<raw url>&key=<base64>&nonce=<base64>`.
//! The secret only travels in the fragment, so it is never sent to the
//! application host. Every link coming from outside goes through
//! [`LinkValidator`] before anything is fetched or decrypted.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use url::{form_urlencoded, Url};

use gitbox_common::{Error, GitRepository, Result};
use gitbox_crypto::Secret;

use crate::config::TransportConfig;
use crate::sanitize::sanitize_repository;

/// Fragment route of the download page.
pub const DOWNLOAD_ROUTE: &str = "/#/download";

/// Query parameter carrying the raw object URL.
pub const PARAM_LOCATION: &str = "location";
/// Query parameter carrying the base64 key.
pub const PARAM_KEY: &str = "key";
/// Query parameter carrying the base64 nonce.
pub const PARAM_NONCE: &str = "nonce";

/// A validated share link.
#[derive(Debug, Clone)]
pub struct ShareLink {
    /// Raw object URL on a trusted host.
    pub location: Url,
    /// Secret decoded from the link.
    pub secret: Secret,
}

/// Repository object a raw URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    /// Sanitized repository identity.
    pub repository: GitRepository,
    /// Path segments inside the repository (at least one).
    pub segments: Vec<String>,
}

impl ObjectLocation {
    /// Decompose `https://<host>/<owner>/<repo>/<branch>/<path...>`.
    ///
    /// # Errors
    /// - `InvalidUrl` if owner, repository or branch is empty, or no path
    ///   segment follows them
    pub fn from_raw_url(url: &Url) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidUrl(format!("{}: {}", url, reason));

        let mut parts = url.path().split('/');
        if parts.next() != Some("") {
            return Err(invalid("path must be absolute"));
        }

        let mut identity = [""; 3];
        for slot in identity.iter_mut() {
            *slot = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| {
                invalid("owner, repository and branch must be non-empty")
            })?;
        }

        let segments: Vec<String> = parts.map(str::to_string).collect();
        if segments.last().map_or(true, |s| s.is_empty()) {
            return Err(invalid("missing object path"));
        }

        let [owner, name, branch] = identity;
        Ok(Self {
            repository: sanitize_repository(&GitRepository::new(owner, name, branch)),
            segments,
        })
    }

    /// Full object path inside the repository.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    /// Directory containing the object (empty for the root).
    pub fn parent_path(&self) -> String {
        self.segments[..self.segments.len() - 1].join("/")
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

/// Validator for untrusted URLs and payloads.
#[derive(Debug, Clone)]
pub struct LinkValidator {
    expected_host: String,
    trusted_raw_hosts: Vec<String>,
}

impl LinkValidator {
    /// Create a validator.
    pub fn new(expected_host: impl Into<String>, trusted_raw_hosts: Vec<String>) -> Self {
        Self {
            expected_host: expected_host.into(),
            trusted_raw_hosts,
        }
    }

    /// Create a validator from transport configuration.
    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.expected_host.clone(), config.trusted_raw_hosts.clone())
    }

    /// Parse an absolute URL.
    pub fn validate_url(&self, url: &str) -> Result<Url> {
        Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}", e)))
    }

    /// Check that `url` is served from the expected host.
    pub fn validate_self_url(&self, url: &str) -> Result<Url> {
        let parsed = self.validate_url(url)?;
        match parsed.host_str() {
            Some(host) if host == self.expected_host => Ok(parsed),
            host => Err(Error::InvalidSelfDomain(host.unwrap_or_default().to_string())),
        }
    }

    /// Check that a raw object URL is https and on a trusted host.
    pub fn validate_remote_object_url(&self, location: Option<&str>) -> Result<Url> {
        let location =
            location.ok_or_else(|| Error::InvalidUrl("missing location parameter".to_string()))?;
        let parsed = self.validate_url(location)?;

        if parsed.scheme() != "https" {
            return Err(Error::UnexpectedProtocol(parsed.scheme().to_string()));
        }

        let host = parsed.host_str().unwrap_or_default();
        if !self.trusted_raw_hosts.iter().any(|trusted| trusted == host) {
            return Err(Error::UnexpectedHostname(host.to_string()));
        }

        Ok(parsed)
    }

    /// Check and decode the `key`/`nonce` payload.
    ///
    /// Presence is checked first, then the base64 shape of both values, and
    /// only then are they decoded.
    pub fn validate_payload(&self, key: Option<&str>, nonce: Option<&str>) -> Result<Secret> {
        let (key, nonce) = match (key, nonce) {
            (Some(key), Some(nonce)) => (key, nonce),
            _ => return Err(Error::MissingPayload),
        };

        if !is_base64(key) || !is_base64(nonce) {
            return Err(Error::InvalidBase64Payload);
        }

        let key = STANDARD.decode(key).map_err(|_| Error::InvalidBase64Payload)?;
        let nonce = STANDARD.decode(nonce).map_err(|_| Error::InvalidBase64Payload)?;
        Ok(Secret::from_parts(key, nonce))
    }

    /// Validate a full share link: origin, location, then payload.
    pub fn parse_share_link(&self, link: &str) -> Result<ShareLink> {
        let url = self.validate_self_url(link)?;
        let params = fragment_params(&url);

        let location = self.validate_remote_object_url(params.get(PARAM_LOCATION).map(String::as_str))?;
        let secret = self.validate_payload(
            params.get(PARAM_KEY).map(String::as_str),
            params.get(PARAM_NONCE).map(String::as_str),
        )?;

        Ok(ShareLink { location, secret })
    }

    /// Validate a share link and locate its object, ignoring the payload.
    pub fn parse_object_location(&self, link: &str) -> Result<ObjectLocation> {
        let url = self.validate_self_url(link)?;
        let params = fragment_params(&url);
        let location = self.validate_remote_object_url(params.get(PARAM_LOCATION).map(String::as_str))?;
        ObjectLocation::from_raw_url(&location)
    }
}

/// Build a share link for `location` and `secret`.
pub fn build_share_link(app_url: &str, location: &str, secret: &Secret) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(PARAM_LOCATION, location)
        .append_pair(PARAM_KEY, &STANDARD.encode(secret.key()))
        .append_pair(PARAM_NONCE, &STANDARD.encode(secret.nonce()))
        .finish();

    format!("{}{}?{}", app_url.trim_end_matches('/'), DOWNLOAD_ROUTE, query)
}

/// Query parameters of a hash-routed URL (`#/route?a=b`). First value wins.
fn fragment_params(url: &Url) -> HashMap<String, String> {
    let fragment = url.fragment().unwrap_or_default();
    let query = fragment.split_once('?').map(|(_, q)| q).unwrap_or_default();

    let mut params = HashMap::new();
    for (name, value) in form_urlencoded::parse(query.as_bytes()) {
        params.entry(name.into_owned()).or_insert_with(|| value.into_owned());
    }
    params
}

/// Standard-alphabet base64 shape check: groups of four, at most two
/// trailing `=`. The empty string is accepted.
pub fn is_base64(s: &str) -> bool {
    if s.len() % 4 != 0 {
        return false;
    }

    let body = s
        .strip_suffix("==")
        .or_else(|| s.strip_suffix('='))
        .unwrap_or(s);

    body.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> LinkValidator {
        LinkValidator::from_config(&TransportConfig::default())
    }

    fn secret() -> Secret {
        Secret::from_parts(vec![0xFB; 32], vec![0x3E; 24])
    }

    const RAW: &str = "https://raw.githubusercontent.com/alexrintt/drive/main/.gitbox/abc";

    #[test]
    fn test_is_base64() {
        assert!(is_base64(""));
        assert!(is_base64("aGVsbG8="));
        assert!(is_base64("aGk="));
        assert!(is_base64("aG=="));
        assert!(is_base64("ab+/"));
        assert!(!is_base64("aGk"));
        assert!(!is_base64("a==="));
        assert!(!is_base64("a=b="));
        assert!(!is_base64("ab-_"));
        assert!(!is_base64("ab c"));
    }

    #[test]
    fn test_build_and_parse() {
        let link = build_share_link("https://alexrintt.io/gitbox/", RAW, &secret());
        assert!(link.starts_with("https://alexrintt.io/gitbox/#/download?location="));

        let parsed = validator().parse_share_link(&link).unwrap();
        assert_eq!(parsed.location.as_str(), RAW);
        assert_eq!(parsed.secret, secret());
    }

    #[test]
    fn test_self_domain_is_checked_first() {
        let link = build_share_link("https://alexrintt.io.evil.example", RAW, &secret());
        assert!(matches!(
            validator().parse_share_link(&link),
            Err(Error::InvalidSelfDomain(_))
        ));
    }

    #[test]
    fn test_unparseable_link() {
        assert!(matches!(
            validator().parse_share_link("not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_untrusted_host() {
        assert!(matches!(
            validator().validate_remote_object_url(Some("https://evil.example/f")),
            Err(Error::UnexpectedHostname(host)) if host == "evil.example"
        ));
    }

    #[test]
    fn test_plain_http() {
        assert!(matches!(
            validator().validate_remote_object_url(Some(
                "http://raw.githubusercontent.com/alexrintt/drive/main/.gitbox/abc"
            )),
            Err(Error::UnexpectedProtocol(scheme)) if scheme == "http"
        ));
    }

    #[test]
    fn test_missing_location() {
        let link = "https://alexrintt.io/gitbox/#/download?key=aGk=&nonce=aGk=";
        assert!(matches!(
            validator().parse_share_link(link),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_missing_payload() {
        assert!(matches!(
            validator().validate_payload(Some("aGk="), None),
            Err(Error::MissingPayload)
        ));
        assert!(matches!(
            validator().validate_payload(None, None),
            Err(Error::MissingPayload)
        ));
    }

    #[test]
    fn test_invalid_base64_payload() {
        assert!(matches!(
            validator().validate_payload(Some("not base64!"), Some("aGk=")),
            Err(Error::InvalidBase64Payload)
        ));
    }

    #[test]
    fn test_payload_is_decoded() {
        let secret = validator().validate_payload(Some("aGk="), Some("aGVsbG8=")).unwrap();
        assert_eq!(secret.key(), b"hi");
        assert_eq!(secret.nonce(), b"hello");
    }

    #[test]
    fn test_first_parameter_wins() {
        let mut link = build_share_link(DEFAULT_LINK_BASE, RAW, &secret());
        link.push_str("&location=https%3A%2F%2Fevil.example%2Ff");

        let parsed = validator().parse_share_link(&link).unwrap();
        assert_eq!(parsed.location.as_str(), RAW);
    }

    const DEFAULT_LINK_BASE: &str = "https://alexrintt.io/gitbox";

    #[test]
    fn test_object_location() {
        let url = Url::parse(RAW).unwrap();
        let location = ObjectLocation::from_raw_url(&url).unwrap();

        assert_eq!(location.repository, GitRepository::new("alexrintt", "drive", "main"));
        assert_eq!(location.path(), ".gitbox/abc");
        assert_eq!(location.parent_path(), ".gitbox");
        assert_eq!(location.file_name(), "abc");
    }

    #[test]
    fn test_object_location_at_root() {
        let url = Url::parse("https://raw.githubusercontent.com/o/r/b/file").unwrap();
        let location = ObjectLocation::from_raw_url(&url).unwrap();

        assert_eq!(location.parent_path(), "");
        assert_eq!(location.path(), "file");
    }

    #[test]
    fn test_object_location_is_sanitized() {
        let url = Url::parse("https://raw.githubusercontent.com/a-b/My%20Repo/b/f").unwrap();
        let location = ObjectLocation::from_raw_url(&url).unwrap();

        assert_eq!(location.repository.owner, "ab");
        assert_eq!(location.repository.name, "my-20repo");
    }

    #[test]
    fn test_object_location_rejects_short_paths() {
        for raw in [
            "https://raw.githubusercontent.com/o/r/b",
            "https://raw.githubusercontent.com/o/r/b/",
            "https://raw.githubusercontent.com/o/r",
            "https://raw.githubusercontent.com//r/b/f",
        ] {
            let url = Url::parse(raw).unwrap();
            assert!(
                matches!(ObjectLocation::from_raw_url(&url), Err(Error::InvalidUrl(_))),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_parse_object_location_from_link() {
        let link = build_share_link(DEFAULT_LINK_BASE, RAW, &secret());
        let location = validator().parse_object_location(&link).unwrap();
        assert_eq!(location.file_name(), "abc");
    }
}
