//! Common utilities and types shared across GitBox crates.
//!
//! This module provides the error taxonomy used by every layer of the
//! encrypted transport, plus the small identity types (repository, token)
//! that travel between them.

pub mod error;
pub mod types;

pub use error::{Error, ErrorInfo, Result};
pub use types::{AccessToken, GitRepository};
