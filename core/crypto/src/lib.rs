//! Cryptographic primitives for GitBox.
//!
//! This module provides:
//! - Per-file secrets (`key` + `nonce`) with automatic zeroization
//! - Two interchangeable authenticated-encryption providers:
//!   XSalsa20-Poly1305 secretbox and AES-256-GCM
//! - Fixed-output 256-bit content hashing
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Decryption failures are reported uniformly as `AuthenticationFailure`
//! - Digest comparisons are constant-time

pub mod gcm;
pub mod provider;
pub mod secret;
pub mod secretbox;

pub use gcm::AesGcmProvider;
pub use provider::{digests_match, CryptoBackend, E2eeProvider};
pub use secret::Secret;
pub use secretbox::SecretboxProvider;
