//! Common error types for GitBox.
//!
//! Every failure carries a stable machine-readable code (see [`Error::code`])
//! and a human-readable message (its `Display` output).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for GitBox operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A URL could not be parsed or has an unexpected shape.
    #[error("Provided URL is not valid, the link is broken: {0}")]
    InvalidUrl(String),

    /// The client is running on (or was handed a link for) an unexpected host.
    #[error("Invalid domain URL, the client is running on an odd domain: {0}")]
    InvalidSelfDomain(String),

    /// The remote object URL points to a host outside the allow-list.
    #[error("The download URL does not come from a trusted domain and is probably crafted: {0}")]
    UnexpectedHostname(String),

    /// The remote object URL does not use https.
    #[error("The download URL is not a HTTPS URL, refusing to connect over {0}")]
    UnexpectedProtocol(String),

    /// `key` or `nonce` is missing from the link.
    #[error("Key or nonce is missing in the URL")]
    MissingPayload,

    /// `key` or `nonce` is not valid base64.
    #[error("Key or nonce provided by the URL is not a valid base64 string")]
    InvalidBase64Payload,

    /// The envelope is shorter than its own header declares.
    #[error("Envelope truncated: header declares {declared} bytes, got {actual}")]
    TruncatedEnvelope { declared: usize, actual: usize },

    /// The link secret does not match the hashes embedded in the envelope.
    #[error("Incorrect key and nonce, the target file cannot be decrypted using the provided keys")]
    KeyMismatch,

    /// Authenticated decryption rejected the ciphertext.
    #[error("Authentication failed, the ciphertext was rejected")]
    AuthenticationFailure,

    /// Fetching the raw object returned a non-200 status.
    #[error("Target download URL returned status code {status}, it usually means it doesn't exist or is private")]
    InvalidDownloadUrl { status: u16 },

    /// The object referenced by a link could not be found in the repository tree.
    #[error("Provided file path doesn't exist: {0}")]
    InvalidFilePath(String),

    /// The access token is empty, invalid or expired.
    #[error("The provided token is not valid or expired")]
    InvalidToken,

    /// The repository is private or does not exist.
    #[error("The provided repository is private or doesn't exist, only public repositories are allowed")]
    PrivateOrNonExistentRepository,

    /// The token owner cannot push to the repository.
    #[error("The provided access token doesn't have write permission on the target repository")]
    UserHasNoWritePermission,

    /// The remote store refused the object write.
    #[error("File upload failed with status code {status}")]
    UploadFailed { status: u16 },

    /// The remote store refused the object removal.
    #[error("File delete failed with status code {status}")]
    DeleteFailed { status: u16 },

    /// Cryptographic misuse (for example a secret of the wrong size on encrypt).
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Transport-level network failure.
    #[error("Network error: {0}")]
    Network(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::InvalidSelfDomain(_) => "INVALID_SELF_DOMAIN",
            Error::UnexpectedHostname(_) => "UNEXPECTED_HOSTNAME",
            Error::UnexpectedProtocol(_) => "UNEXPECTED_PROTOCOL",
            Error::MissingPayload => "MISSING_PAYLOAD",
            Error::InvalidBase64Payload => "INVALID_BASE64_PAYLOAD",
            Error::TruncatedEnvelope { .. } => "TRUNCATED_ENVELOPE",
            Error::KeyMismatch => "KEY_MISMATCH",
            Error::AuthenticationFailure => "AUTHENTICATION_FAILURE",
            Error::InvalidDownloadUrl { .. } => "INVALID_DOWNLOAD_URL",
            Error::InvalidFilePath(_) => "INVALID_FILE_PATH",
            Error::InvalidToken => "INVALID_TOKEN",
            Error::PrivateOrNonExistentRepository => "PRIVATE_OR_NON_EXISTENT_REPOSITORY",
            Error::UserHasNoWritePermission => "USER_HAS_NO_WRITE_PERMISSION",
            Error::UploadFailed { .. } => "UPLOAD_FAILED",
            Error::DeleteFailed { .. } => "DELETE_FAILED",
            Error::Crypto(_) => "CRYPTO",
            Error::Network(_) => "NETWORK",
            Error::Io(_) => "IO",
            Error::Serialization(_) => "SERIALIZATION",
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::NotFound(_) => "NOT_FOUND",
        }
    }

    /// Snapshot this error as a plain `{code, message}` record.
    pub fn to_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Serializable `{code, message}` view of an [`Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
