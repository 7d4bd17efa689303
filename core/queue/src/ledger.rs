//! Durable task ledger.
//!
//! Tasks are stored as one JSON array. Loading validates each entry on its
//! own, so one malformed entry never costs the rest of the queue.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use gitbox_common::{Error, Result};

use crate::task::UploadTask;

/// JSON file holding the upload tasks.
#[derive(Debug, Clone)]
pub struct TaskLedger {
    path: PathBuf,
}

impl TaskLedger {
    /// Ledger stored at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Location of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every well-formed task.
    ///
    /// A missing file is an empty ledger. Entries that do not have the task
    /// shape are dropped; a document that is not an array is dropped whole.
    pub async fn load(&self) -> Result<Vec<UploadTask>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        Ok(parse_tasks(&content))
    }

    /// Replace the ledger with `tasks`.
    pub async fn save(&self, tasks: &[UploadTask]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(tasks)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        // Write then rename so a crash never leaves a half-written ledger.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(count = tasks.len(), "Ledger saved");
        Ok(())
    }
}

/// Parse a ledger document, keeping only valid task entries.
pub fn parse_tasks(content: &str) -> Vec<UploadTask> {
    let entries = match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            warn!("Ledger is not an array, discarding it");
            return Vec::new();
        }
        Err(e) => {
            warn!(error = %e, "Ledger is not valid JSON, discarding it");
            return Vec::new();
        }
    };

    let total = entries.len();
    let tasks: Vec<UploadTask> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();

    if tasks.len() != total {
        warn!(dropped = total - tasks.len(), "Dropped malformed ledger entries");
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{FileMetadata, UploadStatus};
    use chrono::Utc;
    use tempfile::TempDir;

    fn task(name: &str) -> UploadTask {
        UploadTask::new(FileMetadata::new(name, 3, Utc::now()))
    }

    #[tokio::test]
    async fn test_missing_ledger_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = TaskLedger::new(dir.path().join("upload_tasks.json"));

        assert!(ledger.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let ledger = TaskLedger::new(dir.path().join("nested").join("upload_tasks.json"));

        let mut uploaded = task("b.txt");
        uploaded.mark_uploaded("link".to_string());
        let tasks = vec![task("a.txt"), uploaded];

        ledger.save(&tasks).await.unwrap();
        let loaded = ledger.load().await.unwrap();

        assert_eq!(loaded, tasks);
        assert!(!ledger.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_malformed_entries_are_dropped() {
        let good = serde_json::to_value(task("a.txt")).unwrap();
        let document = serde_json::json!([
            good,
            { "status": "uploaded" },
            { "status": "bogus", "file": good["file"], "retryCount": 0 },
            { "status": "failed", "file": good["file"], "retryCount": "three" },
            [1, 2, 3],
            42
        ]);

        let tasks = parse_tasks(&document.to_string());
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].file.name, "a.txt");
        assert_eq!(tasks[0].status, UploadStatus::Initial);
    }

    #[test]
    fn test_non_array_document_is_discarded() {
        assert!(parse_tasks(r#"{"tasks": []}"#).is_empty());
        assert!(parse_tasks("not json").is_empty());
    }
}
