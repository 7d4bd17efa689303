//! Upload task model.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use gitbox_common::{Error, ErrorInfo};

/// Number of retries after the first attempt.
///
/// A task is attempted while `retry_count <= MAX_RETRIES`, so it gets
/// `MAX_RETRIES + 1` attempts in total.
pub const MAX_RETRIES: u32 = 5;

/// Random bytes in a file id.
const FILE_ID_BYTES: usize = 20;

/// Upload status of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Waiting for its first attempt.
    Initial,
    /// Being uploaded.
    Loading,
    /// Last attempt failed.
    Failed,
    /// Stored remotely; the task carries its share link.
    Uploaded,
}

impl UploadStatus {
    /// Lowercase name for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Initial => "initial",
            UploadStatus::Loading => "loading",
            UploadStatus::Failed => "failed",
            UploadStatus::Uploaded => "uploaded",
        }
    }
}

/// Local file a task uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Random id correlating the task with its cached payload.
    pub id: String,
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time of the local file.
    pub modified_at: DateTime<Utc>,
}

impl FileMetadata {
    /// Describe a file under a freshly generated id.
    pub fn new(name: impl Into<String>, size: u64, modified_at: DateTime<Utc>) -> Self {
        Self {
            id: generate_file_id(),
            name: name.into(),
            size,
            modified_at,
        }
    }
}

/// Generate a file id: 40 lowercase hex characters.
pub fn generate_file_id() -> String {
    let mut bytes = [0u8; FILE_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Upload state of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTask {
    /// Current status.
    pub status: UploadStatus,
    /// File being uploaded.
    pub file: FileMetadata,
    /// Share link, once uploaded.
    #[serde(default)]
    pub download_link: Option<String>,
    /// Number of failed attempts.
    #[serde(default)]
    pub retry_count: u32,
    /// Error of the last failed attempt.
    #[serde(default)]
    pub last_error: Option<ErrorInfo>,
}

impl UploadTask {
    /// Create a task for a newly selected file.
    pub fn new(file: FileMetadata) -> Self {
        Self {
            status: UploadStatus::Initial,
            file,
            download_link: None,
            retry_count: 0,
            last_error: None,
        }
    }

    /// Mark as being uploaded.
    pub fn mark_loading(&mut self) {
        self.status = UploadStatus::Loading;
    }

    /// Mark as uploaded with its share link.
    pub fn mark_uploaded(&mut self, link: String) {
        self.status = UploadStatus::Uploaded;
        self.download_link = Some(link);
        self.last_error = None;
    }

    /// Record a failed attempt.
    pub fn mark_failed(&mut self, error: &Error) {
        self.status = UploadStatus::Failed;
        self.retry_count += 1;
        self.last_error = Some(error.to_info());
    }

    /// Whether the next drain pass should attempt this task.
    ///
    /// `Loading` tasks are left over from an interrupted pass and start over.
    pub fn should_attempt(&self) -> bool {
        match self.status {
            UploadStatus::Initial | UploadStatus::Loading => true,
            UploadStatus::Failed => self.retry_count <= MAX_RETRIES,
            UploadStatus::Uploaded => false,
        }
    }

    /// Whether retries are used up.
    pub fn is_exhausted(&self) -> bool {
        self.status == UploadStatus::Failed && self.retry_count > MAX_RETRIES
    }
}
