//! Upload queue driving the transport for pending local files.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use gitbox_common::{AccessToken, Error, GitRepository, Result};
use gitbox_transport::GitBoxTransport;

use crate::cache::BlobCache;
use crate::ledger::TaskLedger;
use crate::task::{FileMetadata, UploadStatus, UploadTask};

/// Counts of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks uploaded in this pass.
    pub uploaded: usize,
    /// Tasks that failed in this pass.
    pub failed: usize,
    /// Tasks left alone because their retries are used up.
    pub exhausted: usize,
}

/// Result of asking for a drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The pass ran to completion.
    Completed(DrainReport),
    /// Another pass is in flight; nothing was done.
    AlreadyRunning,
}

/// A task taken off the queue.
#[derive(Debug)]
pub struct Removal {
    /// The removed task.
    pub task: UploadTask,
    /// Failure deleting the remote object of an uploaded task. The task is
    /// gone either way.
    pub remote_error: Option<Error>,
}

/// Retrying upload queue.
///
/// Tasks are uploaded one at a time, so the remote store never sees
/// concurrent writes from this queue. At most one drain pass runs at once;
/// files enqueued during a pass are picked up by the next one. Every change
/// to the task list is persisted to the ledger.
pub struct UploadQueue {
    transport: Arc<GitBoxTransport>,
    cache: Arc<dyn BlobCache>,
    ledger: Option<TaskLedger>,
    tasks: RwLock<Vec<UploadTask>>,
    drain_lock: Mutex<()>,
}

impl UploadQueue {
    /// Open a queue backed by `ledger`, restoring its tasks.
    pub async fn open(
        transport: Arc<GitBoxTransport>,
        cache: Arc<dyn BlobCache>,
        ledger: TaskLedger,
    ) -> Result<Self> {
        let tasks = ledger.load().await?;
        info!(count = tasks.len(), "Upload queue restored");

        Ok(Self {
            transport,
            cache,
            ledger: Some(ledger),
            tasks: RwLock::new(tasks),
            drain_lock: Mutex::new(()),
        })
    }

    /// Create a queue that is not persisted.
    pub fn in_memory(transport: Arc<GitBoxTransport>, cache: Arc<dyn BlobCache>) -> Self {
        Self {
            transport,
            cache,
            ledger: None,
            tasks: RwLock::new(Vec::new()),
            drain_lock: Mutex::new(()),
        }
    }

    /// Cache the payload of a local file and add a task for it.
    pub async fn enqueue(
        &self,
        name: impl Into<String>,
        data: &[u8],
        modified_at: DateTime<Utc>,
    ) -> Result<FileMetadata> {
        let file = FileMetadata::new(name, data.len() as u64, modified_at);
        self.cache.put(&file.id, data).await?;

        {
            let mut tasks = self.tasks.write().await;
            tasks.push(UploadTask::new(file.clone()));
        }
        self.persist().await?;

        debug!(id = %file.id, size = file.size, "Task enqueued");
        Ok(file)
    }

    /// All tasks, oldest file first.
    pub async fn tasks(&self) -> Vec<UploadTask> {
        let mut tasks = self.tasks.read().await.clone();
        tasks.sort_by(|a, b| {
            a.file
                .modified_at
                .cmp(&b.file.modified_at)
                .then_with(|| a.file.id.cmp(&b.file.id))
        });
        tasks
    }

    /// Task for file `id`.
    pub async fn task(&self, id: &str) -> Option<UploadTask> {
        self.tasks.read().await.iter().find(|t| t.file.id == id).cloned()
    }

    /// Run one pass over every task that should be attempted.
    ///
    /// Upload errors are recorded on their task, not returned; only ledger
    /// failures abort the pass.
    pub async fn drain(
        &self,
        repository: &GitRepository,
        credential: &AccessToken,
    ) -> Result<DrainOutcome> {
        let Ok(_guard) = self.drain_lock.try_lock() else {
            debug!("Drain pass already running");
            return Ok(DrainOutcome::AlreadyRunning);
        };

        let pending: Vec<String> = self
            .tasks()
            .await
            .into_iter()
            .filter(UploadTask::should_attempt)
            .map(|t| t.file.id)
            .collect();

        info!(pending = pending.len(), "Starting drain pass");
        let mut report = DrainReport::default();

        for id in pending {
            let Some(name) = self.update(&id, |task| task.mark_loading()).await?.map(|t| t.file.name)
            else {
                // Removed since the pass started.
                continue;
            };

            let result = match self.cache.get(&id).await {
                Ok(Some(data)) => {
                    self.transport
                        .generate_share_link(&name, &data, repository, credential)
                        .await
                }
                Ok(None) => Err(Error::NotFound(format!("Cached payload for {}", id))),
                Err(e) => Err(e),
            };

            match result {
                Ok(link) => {
                    self.update(&id, |task| task.mark_uploaded(link)).await?;
                    if let Err(e) = self.cache.remove(&id).await {
                        warn!(id = %id, error = %e, "Failed to drop cached payload");
                    }
                    report.uploaded += 1;
                    info!(id = %id, "Task uploaded");
                }
                Err(e) => {
                    let task = self.update(&id, |task| task.mark_failed(&e)).await?;
                    report.failed += 1;
                    warn!(
                        id = %id,
                        code = e.code(),
                        retries = task.map(|t| t.retry_count).unwrap_or_default(),
                        "Task failed"
                    );
                }
            }
        }

        report.exhausted = self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| t.is_exhausted())
            .count();

        info!(
            uploaded = report.uploaded,
            failed = report.failed,
            exhausted = report.exhausted,
            "Drain pass finished"
        );
        Ok(DrainOutcome::Completed(report))
    }

    /// Remove a task on user request.
    ///
    /// An uploaded task has its remote object deleted first; the task is
    /// dropped even if that delete fails, and the failure is reported in
    /// [`Removal::remote_error`]. An `Err` means nothing was removed.
    ///
    /// # Errors
    /// - `NotFound` if there is no such task
    /// - `InvalidInput` if the task is being uploaded or a drain pass is running
    pub async fn remove_task(&self, id: &str, credential: &AccessToken) -> Result<Removal> {
        // A pass may hold a snapshot of this task and mark it loading at any point.
        let Ok(_guard) = self.drain_lock.try_lock() else {
            return Err(Error::InvalidInput(
                "An upload pass is running, try again when it finishes".to_string(),
            ));
        };

        let task = self
            .task(id)
            .await
            .ok_or_else(|| Error::NotFound(format!("Upload task not found: {}", id)))?;

        let remote = match (task.status, task.download_link.as_deref()) {
            (UploadStatus::Loading, _) => {
                return Err(Error::InvalidInput(format!(
                    "Task {} is being uploaded and cannot be removed",
                    id
                )))
            }
            (UploadStatus::Uploaded, Some(link)) => {
                self.transport.delete_shared_object(link, credential).await
            }
            _ => Ok(()),
        };

        self.tasks.write().await.retain(|t| t.file.id != id);
        if let Err(e) = self.cache.remove(id).await {
            warn!(id = %id, error = %e, "Failed to drop cached payload");
        }
        self.persist().await?;

        info!(id = %id, remote_deleted = remote.is_ok(), "Task removed");
        Ok(Removal {
            task,
            remote_error: remote.err(),
        })
    }

    /// Apply `f` to the task with file `id` and persist.
    async fn update<F>(&self, id: &str, f: F) -> Result<Option<UploadTask>>
    where
        F: FnOnce(&mut UploadTask),
    {
        let updated = {
            let mut tasks = self.tasks.write().await;
            tasks.iter_mut().find(|t| t.file.id == id).map(|task| {
                f(task);
                task.clone()
            })
        };

        if updated.is_some() {
            self.persist().await?;
        }
        Ok(updated)
    }

    async fn persist(&self) -> Result<()> {
        if let Some(ledger) = &self.ledger {
            let snapshot = self.tasks.read().await.clone();
            ledger.save(&snapshot).await?;
        }
        Ok(())
    }
}
