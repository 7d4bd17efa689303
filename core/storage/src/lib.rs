//! Remote object storage for GitBox.
//!
//! The transport only talks to a repository through two interfaces:
//! [`RemoteStore`] (put, raw get, tree listing, delete) and
//! [`AccessChecker`] (write-access verification). This crate provides the
//! GitHub implementation of both plus in-memory fakes for tests.

pub mod github;
pub mod memory;
pub mod provider;

pub use github::{GitHubAccessChecker, GitHubClient, GitHubStore};
pub use memory::{AccessDecision, MemoryStore, StaticAccessChecker};
pub use provider::{AccessChecker, RawObject, RemoteStore, StoreStatus, TreeEntry, TreeListing};
