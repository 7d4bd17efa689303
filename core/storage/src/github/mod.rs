//! GitHub remote store and access check.
//!
//! Objects are written through the REST contents API, so every write and
//! delete is a commit. Raw bytes are served by `raw.githubusercontent.com`.

pub mod access;
pub mod client;
pub mod store;

pub use access::GitHubAccessChecker;
pub use client::{GitHubClient, API_BASE, RAW_HOST};
pub use store::GitHubStore;
