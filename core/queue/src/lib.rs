//! GitBox upload queue.
//!
//! This module provides:
//! - Upload tasks with a bounded retry state machine
//! - A durable JSON task ledger that survives malformed entries
//! - A payload cache keyed by file id
//! - [`UploadQueue`], draining pending tasks one at a time through the transport

pub mod cache;
pub mod ledger;
pub mod queue;
pub mod task;

pub use cache::{BlobCache, FsBlobCache, MemoryBlobCache};
pub use ledger::TaskLedger;
pub use queue::{DrainOutcome, DrainReport, Removal, UploadQueue};
pub use task::{generate_file_id, FileMetadata, UploadStatus, UploadTask, MAX_RETRIES};
